//! Normalization of provider-shaped frames into the canonical layout.
//!
//! Providers ship whatever column names and dtypes they like ("Adj Close",
//! "timestamp", string prices). Normalization matches headers against a
//! small alias table case-insensitively, coerces each column to its
//! canonical dtype with per-value failures becoming nulls (rows are never
//! dropped), attaches a constant `ticker` column, and canonicalizes row
//! order: ascending by date, duplicate dates collapsed keeping the last
//! occurrence so later-appended rows win.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::error::SiloError;
use crate::schema;

/// Days since the Unix epoch, the physical representation of a Date column.
pub(crate) fn epoch_days(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    (date - epoch).num_days() as i32
}

fn alias_matches(canonical: &str, header: &str) -> bool {
    let header = header.trim().to_ascii_lowercase();
    match canonical {
        "date" => matches!(header.as_str(), "date" | "datetime" | "timestamp"),
        "adj_close" => matches!(
            header.as_str(),
            "adj close" | "adj_close" | "adjclose" | "adjusted close" | "adjusted_close"
        ),
        "volume" => matches!(header.as_str(), "volume" | "vol"),
        other => header == other,
    }
}

fn source_column<'a>(raw: &'a DataFrame, canonical: &str) -> Option<&'a Column> {
    raw.get_columns()
        .iter()
        .find(|c| alias_matches(canonical, c.name().as_str()))
}

fn parse_date_str(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .ok()?;
    Some(epoch_days(date))
}

/// Coerce a source column to a physical Date column named `date`.
///
/// Datetimes are truncated to their calendar day, strings are parsed in a
/// few common layouts, anything unparseable becomes null. A missing source
/// yields an all-null column of the right height.
pub(crate) fn date_column(source: Option<&Column>, height: usize) -> Result<Column, SiloError> {
    let Some(col) = source else {
        return Ok(Column::full_null("date".into(), height, &DataType::Date));
    };
    let out = match col.dtype() {
        DataType::Date => col.clone(),
        DataType::Datetime(_, _) => col.cast(&DataType::Date)?,
        DataType::String => {
            let days: Vec<Option<i32>> = col
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_date_str))
                .collect();
            Column::new("date".into(), days).cast(&DataType::Date)?
        }
        _ => Column::full_null("date".into(), height, &DataType::Date),
    };
    let mut out = out;
    out.rename("date".into());
    Ok(out)
}

fn price_column(source: Option<&Column>, name: &str, height: usize) -> Result<Column, SiloError> {
    let Some(col) = source else {
        return Ok(Column::full_null(name.into(), height, &DataType::Float64));
    };
    let out = match col.dtype() {
        DataType::Float64 => col.clone(),
        DataType::Float32
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => col.cast(&DataType::Float64)?,
        DataType::String => {
            let parsed: Vec<Option<f64>> = col
                .str()?
                .into_iter()
                .map(|v| {
                    v.and_then(|s| s.trim().parse::<f64>().ok())
                        .filter(|x| x.is_finite())
                })
                .collect();
            Column::new(name.into(), parsed)
        }
        _ => Column::full_null(name.into(), height, &DataType::Float64),
    };
    let mut out = out;
    out.rename(name.into());
    Ok(out)
}

fn volume_column(source: Option<&Column>, height: usize) -> Result<Column, SiloError> {
    let Some(col) = source else {
        return Ok(Column::full_null("volume".into(), height, &DataType::Int64));
    };
    let out = match col.dtype() {
        DataType::Int64 => col.clone(),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => col.cast(&DataType::Int64)?,
        DataType::Float32 | DataType::Float64 => {
            let floats = col.cast(&DataType::Float64)?;
            let parsed: Vec<Option<i64>> = floats
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()).map(|x| x as i64))
                .collect();
            Column::new("volume".into(), parsed)
        }
        DataType::String => {
            let parsed: Vec<Option<i64>> = col
                .str()?
                .into_iter()
                .map(|v| {
                    v.and_then(|s| {
                        let s = s.trim();
                        s.parse::<i64>().ok().or_else(|| {
                            s.parse::<f64>()
                                .ok()
                                .filter(|x| x.is_finite())
                                .map(|x| x as i64)
                        })
                    })
                })
                .collect();
            Column::new("volume".into(), parsed)
        }
        _ => Column::full_null("volume".into(), height, &DataType::Int64),
    };
    let mut out = out;
    out.rename("volume".into());
    Ok(out)
}

/// Normalize a raw provider frame for `ticker` into the canonical layout.
///
/// The output always has the canonical columns in canonical order, one row
/// per input row minus exact-date duplicates, sorted ascending by date.
/// An empty input yields an empty canonical frame.
pub fn normalize(raw: &DataFrame, ticker: &str) -> Result<DataFrame, SiloError> {
    let ticker = ticker.trim().to_uppercase();
    if raw.height() == 0 {
        return schema::empty_frame();
    }
    let height = raw.height();
    let mut columns = Vec::with_capacity(schema::COLUMNS.len());
    columns.push(date_column(source_column(raw, "date"), height)?);
    for name in schema::PRICE_COLUMNS {
        columns.push(price_column(source_column(raw, name), name, height)?);
    }
    columns.push(volume_column(source_column(raw, "volume"), height)?);
    columns.push(Column::new("ticker".into(), vec![ticker.as_str(); height]));
    canonicalize(DataFrame::new(columns)?)
}

/// Sort ascending by date and collapse duplicate dates, keeping the last
/// occurrence. The sort is stable, so within a duplicate date the row that
/// was appended later survives.
pub fn canonicalize(df: DataFrame) -> Result<DataFrame, SiloError> {
    if df.height() == 0 {
        return Ok(df);
    }
    let out = df
        .lazy()
        .sort(
            ["date"],
            SortMultipleOptions::default()
                .with_order_descending_multi([false])
                .with_maintain_order(true),
        )
        .unique_stable(Some(vec!["date".into()]), UniqueKeepStrategy::Last)
        .collect()?;
    Ok(out)
}

/// Merge an incoming canonical frame into an existing one.
///
/// Rows are concatenated with incoming rows after existing ones, so on a
/// duplicate date the incoming row wins. Merging an empty frame is a no-op
/// apart from canonicalization.
pub fn merge_frames(existing: &DataFrame, incoming: &DataFrame) -> Result<DataFrame, SiloError> {
    if existing.height() == 0 {
        return canonicalize(incoming.clone());
    }
    if incoming.height() == 0 {
        return canonicalize(existing.clone());
    }
    let stacked = existing.vstack(incoming)?;
    canonicalize(stacked)
}
