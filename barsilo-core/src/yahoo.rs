//! Yahoo Finance daily-bar provider.
//!
//! Fetches daily OHLCV rows from Yahoo's v8 chart API with retry and
//! exponential backoff. Yahoo has no official API and changes formats
//! without notice, so responses are parsed defensively and handed to the
//! normalization layer as-is ("Date", "Adj Close", and friends).

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Deserialize;
use std::time::Duration;

use crate::error::SiloError;
use crate::provider::DataProvider;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance provider for daily bars.
pub struct YahooDaily {
    client: reqwest::blocking::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl Default for YahooDaily {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooDaily {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Build the chart API URL for a ticker and `[start, end)` range.
    /// Both period bounds are midnight UTC, which makes `period2` exclusive.
    fn chart_url(ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        let end_ts = end.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{ticker}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    /// Turn a chart response into a raw frame with Yahoo's column names.
    ///
    /// Rows where every OHLCV field is null (holidays, half-session
    /// padding) are skipped. A response with no timestamps is a success
    /// with zero rows, not an error.
    fn parse_response(ticker: &str, resp: ChartResponse) -> Result<DataFrame, SiloError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    SiloError::TickerNotFound {
                        ticker: ticker.to_string(),
                    }
                } else {
                    SiloError::BadResponse(format!("{}: {}", err.code, err.description))
                }
            } else {
                SiloError::BadResponse("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| SiloError::BadResponse("result array is empty".into()))?;

        let Some(timestamps) = data.timestamp else {
            return Ok(DataFrame::empty());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| SiloError::BadResponse("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let n = timestamps.len();
        let mut dates_ms: Vec<i64> = Vec::with_capacity(n);
        let mut opens: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut highs: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut lows: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut closes: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut adjs: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut volumes: Vec<Option<i64>> = Vec::with_capacity(n);

        for (i, &ts) in timestamps.iter().enumerate() {
            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());

            // all-null rows are non-trading days
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            dates_ms.push(ts * 1000);
            opens.push(open);
            highs.push(high);
            lows.push(low);
            closes.push(close);
            adjs.push(adj_close);
            volumes.push(volume.map(|v| v as i64));
        }

        if dates_ms.is_empty() {
            return Ok(DataFrame::empty());
        }

        let date = Column::new("Date".into(), dates_ms)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        Ok(DataFrame::new(vec![
            date,
            Column::new("Open".into(), opens),
            Column::new("High".into(), highs),
            Column::new("Low".into(), lows),
            Column::new("Close".into(), closes),
            Column::new("Adj Close".into(), adjs),
            Column::new("Volume".into(), volumes),
        ])?)
    }

    /// Execute the HTTP request with retry and exponential backoff.
    fn fetch_with_retry(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame, SiloError> {
        let url = Self::chart_url(ticker, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        // IP-level block; retrying digs the hole deeper
                        return Err(SiloError::Other(format!("HTTP 403 (blocked) for {ticker}")));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(SiloError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        // unknown tickers come back as 404 with a JSON error body
                        let body = resp.text().unwrap_or_default();
                        return match serde_json::from_str::<ChartResponse>(&body) {
                            Ok(chart) => Self::parse_response(ticker, chart),
                            Err(_) => Err(SiloError::TickerNotFound {
                                ticker: ticker.to_string(),
                            }),
                        };
                    }

                    if !status.is_success() {
                        last_error = Some(SiloError::Other(format!("HTTP {status} for {ticker}")));
                        continue;
                    }

                    let body = resp.text().map_err(|e| {
                        SiloError::BadResponse(format!("failed to read response for {ticker}: {e}"))
                    })?;
                    let chart: ChartResponse = serde_json::from_str(&body).map_err(|e| {
                        SiloError::BadResponse(format!("failed to parse response for {ticker}: {e}"))
                    })?;
                    return Self::parse_response(ticker, chart);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(SiloError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(SiloError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SiloError::Other("max retries exceeded".into())))
    }
}

impl DataProvider for YahooDaily {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame, SiloError> {
        self.fetch_with_retry(ticker, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart_with(timestamps: Option<Vec<i64>>, quote: QuoteData) -> ChartResponse {
        ChartResponse {
            chart: ChartResult {
                result: Some(vec![ChartData {
                    timestamp: timestamps,
                    indicators: Indicators {
                        quote: vec![quote],
                        adjclose: None,
                    },
                }]),
                error: None,
            },
        }
    }

    #[test]
    fn chart_url_is_end_exclusive_midnight_utc() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2020, 1, 5).unwrap();
        let url = YahooDaily::chart_url("AAPL", start, end);

        assert!(url.contains("/chart/AAPL"));
        assert!(url.contains("period1=1577923200"));
        assert!(url.contains("period2=1578182400"));
        assert!(url.contains("interval=1d"));
    }

    #[test]
    fn parse_skips_all_null_rows() {
        let quote = QuoteData {
            open: vec![Some(10.0), None],
            high: vec![Some(11.0), None],
            low: vec![Some(9.0), None],
            close: vec![Some(10.5), None],
            volume: vec![Some(1_000), None],
        };
        let resp = chart_with(Some(vec![1_577_923_200, 1_578_009_600]), quote);

        let df = YahooDaily::parse_response("AAPL", resp).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.column("Open").unwrap().f64().unwrap().get(0), Some(10.0));
        assert_eq!(
            df.column("Date").unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, None)
        );
    }

    #[test]
    fn parse_no_timestamps_is_empty_success() {
        let quote = QuoteData {
            open: vec![],
            high: vec![],
            low: vec![],
            close: vec![],
            volume: vec![],
        };
        let resp = chart_with(None, quote);

        let df = YahooDaily::parse_response("AAPL", resp).unwrap();
        assert_eq!(df.height(), 0);
    }

    #[test]
    fn error_payload_maps_to_ticker_not_found() {
        let resp = ChartResponse {
            chart: ChartResult {
                result: None,
                error: Some(ChartError {
                    code: "Not Found".into(),
                    description: "No data found, symbol may be delisted".into(),
                }),
            },
        };

        let err = YahooDaily::parse_response("ZZZZ", resp).unwrap_err();
        assert!(matches!(err, SiloError::TickerNotFound { .. }));
    }
}
