//! TickerSeries — one ticker's bar history as a canonical frame.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::bar::Bar;
use crate::error::SiloError;
use crate::normalize::{self, epoch_days};
use crate::schema;

/// A single ticker's daily bars, backed by a frame in the canonical layout.
///
/// Frames produced by the fetch path are canonical (date-sorted, duplicate
/// dates collapsed). Frames loaded from disk are taken as found; the
/// validator is the place that detects and repairs drift.
#[derive(Debug, Clone)]
pub struct TickerSeries {
    ticker: String,
    frame: DataFrame,
}

impl TickerSeries {
    pub fn new(ticker: &str, frame: DataFrame) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            frame,
        }
    }

    /// A zero-row series with the canonical columns.
    pub fn empty(ticker: &str) -> Result<Self, SiloError> {
        Ok(Self::new(ticker, schema::empty_frame()?))
    }

    /// Build a series from typed bars, one row per bar in the given order.
    pub fn from_bars(ticker: &str, bars: &[Bar]) -> Result<Self, SiloError> {
        let dates: Vec<Option<i32>> = bars.iter().map(|b| b.date.map(epoch_days)).collect();
        let opens: Vec<Option<f64>> = bars.iter().map(|b| b.open).collect();
        let highs: Vec<Option<f64>> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<Option<f64>> = bars.iter().map(|b| b.low).collect();
        let closes: Vec<Option<f64>> = bars.iter().map(|b| b.close).collect();
        let adjs: Vec<Option<f64>> = bars.iter().map(|b| b.adj_close).collect();
        let volumes: Vec<Option<i64>> = bars.iter().map(|b| b.volume).collect();
        let tickers: Vec<&str> = bars.iter().map(|b| b.ticker.as_str()).collect();

        let columns = vec![
            Column::new("date".into(), dates).cast(&DataType::Date)?,
            Column::new("open".into(), opens),
            Column::new("high".into(), highs),
            Column::new("low".into(), lows),
            Column::new("close".into(), closes),
            Column::new("adj_close".into(), adjs),
            Column::new("volume".into(), volumes),
            Column::new("ticker".into(), tickers),
        ];
        Ok(Self::new(ticker, DataFrame::new(columns)?))
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// The latest non-null date in the series, regardless of row order.
    pub fn max_date(&self) -> Option<NaiveDate> {
        let dates = self.frame.column("date").ok()?.date().ok()?;
        let max_days = dates.into_iter().flatten().max()?;
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
        Some(epoch + chrono::Duration::days(max_days as i64))
    }

    /// The typed view of every row, in frame order.
    pub fn bars(&self) -> Result<Vec<Bar>, SiloError> {
        let df = &self.frame;
        let n = df.height();
        if n == 0 {
            return Ok(Vec::new());
        }
        let dates = df.column("date")?.date()?;
        let opens = df.column("open")?.f64()?;
        let highs = df.column("high")?.f64()?;
        let lows = df.column("low")?.f64()?;
        let closes = df.column("close")?.f64()?;
        let adjs = df.column("adj_close")?.f64()?;
        let volumes = df.column("volume")?.i64()?;
        let tickers = df.column("ticker")?.str()?;

        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            out.push(Bar {
                date: dates
                    .get(i)
                    .map(|d| epoch + chrono::Duration::days(d as i64)),
                open: opens.get(i),
                high: highs.get(i),
                low: lows.get(i),
                close: closes.get(i),
                adj_close: adjs.get(i),
                volume: volumes.get(i),
                ticker: tickers.get(i).unwrap_or(self.ticker.as_str()).to_string(),
            });
        }
        Ok(out)
    }

    /// Merge incoming bars into this series. Incoming rows win on duplicate
    /// dates; the result is canonical.
    pub fn merge(&self, incoming: &TickerSeries) -> Result<TickerSeries, SiloError> {
        let merged = normalize::merge_frames(&self.frame, &incoming.frame)?;
        Ok(TickerSeries {
            ticker: self.ticker.clone(),
            frame: merged,
        })
    }

    /// Content digest over every row in order. Two series have the same
    /// digest iff they hold the same bars in the same order, so it doubles
    /// as a cheap change detector for the fetch path.
    pub fn digest(&self) -> Result<String, SiloError> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.ticker.as_bytes());
        for bar in self.bars()? {
            match bar.date {
                Some(d) => {
                    hasher.update(&[1]);
                    hasher.update(d.to_string().as_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
            for value in [bar.open, bar.high, bar.low, bar.close, bar.adj_close] {
                match value {
                    Some(v) => {
                        hasher.update(&[1]);
                        hasher.update(&v.to_le_bytes());
                    }
                    None => {
                        hasher.update(&[0]);
                    }
                }
            }
            match bar.volume {
                Some(v) => {
                    hasher.update(&[1]);
                    hasher.update(&v.to_le_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
            hasher.update(bar.ticker.as_bytes());
            // row terminator so field bytes cannot bleed across rows
            hasher.update(&[0xfe]);
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}
