//! Fetch orchestrator — incremental multi-ticker downloads with progress
//! reporting.
//!
//! Each ticker is processed independently: load its cached series, derive
//! the effective fetch window, pull raw rows from the provider, normalize,
//! merge, and write back. A provider failure for one ticker never touches
//! that ticker's file and never stops the rest of the batch.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, Utc};

use crate::error::SiloError;
use crate::normalize::normalize;
use crate::provider::DataProvider;
use crate::schema;
use crate::series::TickerSeries;
use crate::store::SeriesStore;

/// Options controlling a fetch batch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Start date for tickers with no cached history.
    pub start: NaiveDate,
    /// Exclusive end date; defaults to tomorrow (UTC) so today's bar is
    /// included once the market has printed it.
    pub end: Option<NaiveDate>,
    /// Re-download the full range and replace the cached series.
    pub force_full: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            end: None,
            force_full: false,
        }
    }
}

/// Tomorrow in UTC, the default exclusive end of a fetch window.
pub fn tomorrow_utc() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(1)
}

/// The `[start, end)` window a provider request should cover, given the
/// latest cached date. Incremental runs start the day after the cache
/// ends; a forced full run (or an empty cache) starts at `opts.start`.
pub fn effective_window(cached_max: Option<NaiveDate>, opts: &FetchOptions) -> (NaiveDate, NaiveDate) {
    let end = opts.end.unwrap_or_else(tomorrow_utc);
    let start = match cached_max {
        Some(max) if !opts.force_full => max + Duration::days(1),
        _ => opts.start,
    };
    (start, end)
}

/// What happened to one ticker during a fetch batch.
#[derive(Debug, Clone)]
pub struct TickerOutcome {
    pub ticker: String,
    /// The cache file written this run, or `None` when there was nothing
    /// to write (no cached file and an empty fetch).
    pub path: Option<PathBuf>,
    /// Rows the provider returned after normalization.
    pub rows_fetched: usize,
    /// Rows in the cached series after the merge.
    pub rows_total: usize,
    /// Whether the cached content actually changed.
    pub updated: bool,
}

/// Summary of a batch fetch operation.
#[derive(Debug)]
pub struct FetchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<TickerOutcome>,
    pub errors: Vec<(String, SiloError)>,
}

impl FetchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Every cache file written this run, in batch order.
    pub fn written_paths(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter_map(|o| o.path.as_deref())
            .collect()
    }
}

/// Progress callback for multi-ticker fetches.
pub trait FetchProgress: Send {
    /// Called when starting to fetch a ticker.
    fn on_start(&self, ticker: &str, index: usize, total: usize);

    /// Called when a ticker fetch completes.
    fn on_complete(
        &self,
        ticker: &str,
        index: usize,
        total: usize,
        result: &Result<TickerOutcome, SiloError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {ticker}...", index + 1, total);
    }

    fn on_complete(
        &self,
        ticker: &str,
        _index: usize,
        _total: usize,
        result: &Result<TickerOutcome, SiloError>,
    ) {
        match result {
            Ok(outcome) if outcome.rows_fetched == 0 => {
                println!("  OK: {ticker} (up to date, {} rows cached)", outcome.rows_total);
            }
            Ok(outcome) => {
                println!(
                    "  OK: {ticker} ({} fetched, {} cached)",
                    outcome.rows_fetched, outcome.rows_total
                );
            }
            Err(e) => println!("  FAIL: {ticker}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nFetch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Fetch multiple tickers, merging each into its cache file.
///
/// Returns a summary of successes and failures; failures are isolated per
/// ticker and never abort the batch.
pub fn fetch_and_cache(
    provider: &dyn DataProvider,
    store: &SeriesStore,
    tickers: &[String],
    opts: &FetchOptions,
    progress: Option<&dyn FetchProgress>,
) -> FetchSummary {
    let cleaned: Vec<String> = tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect();
    let total = cleaned.len();
    let mut succeeded = 0;
    let mut failed = 0;
    let mut outcomes: Vec<TickerOutcome> = Vec::new();
    let mut errors: Vec<(String, SiloError)> = Vec::new();

    for (i, ticker) in cleaned.iter().enumerate() {
        if let Some(p) = progress {
            p.on_start(ticker, i, total);
        }

        let result = fetch_one(provider, store, ticker, opts);
        if let Some(p) = progress {
            p.on_complete(ticker, i, total, &result);
        }

        match result {
            Ok(outcome) => {
                succeeded += 1;
                outcomes.push(outcome);
            }
            Err(e) => {
                failed += 1;
                errors.push((ticker.clone(), e));
            }
        }
    }

    if let Some(p) = progress {
        p.on_batch_complete(succeeded, failed, total);
    }

    FetchSummary {
        total,
        succeeded,
        failed,
        outcomes,
        errors,
    }
}

/// Fetch one ticker: load cache → window → provider → normalize → merge →
/// write back.
fn fetch_one(
    provider: &dyn DataProvider,
    store: &SeriesStore,
    ticker: &str,
    opts: &FetchOptions,
) -> Result<TickerOutcome, SiloError> {
    let existing = store.load_or_empty(ticker)?;
    let had_file = store.exists(ticker);
    let before = existing.digest()?;

    let (start, end) = effective_window(existing.max_date(), opts);
    let incoming_frame = if start >= end {
        // cache already covers the requested window
        schema::empty_frame()?
    } else {
        let raw = provider.fetch(ticker, start, end)?;
        normalize(&raw, ticker)?
    };

    let rows_fetched = incoming_frame.height();
    let merged = if rows_fetched == 0 {
        // an empty fetch merges as a no-op, even under force_full
        existing
    } else if opts.force_full {
        TickerSeries::new(ticker, incoming_frame)
    } else {
        existing.merge(&TickerSeries::new(ticker, incoming_frame))?
    };

    if merged.is_empty() && !had_file {
        // nothing fetched and no file yet: the cache file is created on
        // the first successful non-empty fetch
        return Ok(TickerOutcome {
            ticker: merged.ticker().to_string(),
            path: None,
            rows_fetched,
            rows_total: 0,
            updated: false,
        });
    }

    let path = store.write(&merged)?;
    let updated = !had_file || merged.digest()? != before;

    Ok(TickerOutcome {
        ticker: merged.ticker().to_string(),
        path: Some(path),
        rows_fetched,
        rows_total: merged.len(),
        updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_without_cache_starts_at_opts_start() {
        let opts = FetchOptions {
            start: date(2015, 6, 1),
            end: Some(date(2020, 1, 1)),
            force_full: false,
        };
        assert_eq!(
            effective_window(None, &opts),
            (date(2015, 6, 1), date(2020, 1, 1))
        );
    }

    #[test]
    fn window_resumes_day_after_cached_max() {
        let opts = FetchOptions {
            start: date(2010, 1, 1),
            end: Some(date(2024, 3, 1)),
            force_full: false,
        };
        assert_eq!(
            effective_window(Some(date(2024, 2, 9)), &opts),
            (date(2024, 2, 10), date(2024, 3, 1))
        );
    }

    #[test]
    fn window_force_full_ignores_cache() {
        let opts = FetchOptions {
            start: date(2010, 1, 1),
            end: Some(date(2024, 3, 1)),
            force_full: true,
        };
        assert_eq!(
            effective_window(Some(date(2024, 2, 9)), &opts),
            (date(2010, 1, 1), date(2024, 3, 1))
        );
    }

    #[test]
    fn window_default_end_is_tomorrow_utc() {
        let opts = FetchOptions::default();
        let (_, end) = effective_window(None, &opts);
        assert_eq!(end, tomorrow_utc());
    }

    #[test]
    fn summary_all_succeeded() {
        let summary = FetchSummary {
            total: 2,
            succeeded: 2,
            failed: 0,
            outcomes: Vec::new(),
            errors: Vec::new(),
        };
        assert!(summary.all_succeeded());

        let summary = FetchSummary {
            total: 2,
            succeeded: 1,
            failed: 1,
            outcomes: Vec::new(),
            errors: vec![("ZZZZ".to_string(), SiloError::Other("boom".into()))],
        };
        assert!(!summary.all_succeeded());
    }
}
