//! Cache validation — quality metrics, light repairs, and CSV reporting.
//!
//! The validator reads cache files as found and reports what is wrong
//! rather than raising: missing files, missing columns, nulls, duplicate
//! or unsorted dates, negative prices, degenerate columns, calendar gaps.
//! Repairs are deliberately conservative: re-coerce the date column, sort,
//! dedupe. Cell content is never rewritten.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::Serialize;

use crate::error::SiloError;
use crate::normalize;
use crate::schema;
use crate::store::SeriesStore;

/// Calendar-day spacing beyond which consecutive dates count as a gap.
/// Three days covers an ordinary weekend plus one holiday.
pub const LARGE_GAP_DAYS: i64 = 3;

/// Per-file quality metrics.
#[derive(Debug, Clone, Serialize)]
pub struct QualityMetrics {
    pub rows: usize,
    pub columns_ok: bool,
    pub null_open: usize,
    pub null_high: usize,
    pub null_low: usize,
    pub null_close: usize,
    pub null_adj_close: usize,
    pub null_volume: usize,
    pub has_nulls: bool,
    /// Value columns that are missing, all-null, or all-zero.
    pub empty_columns: Vec<String>,
    /// Rows minus distinct dates.
    pub duplicate_dates: usize,
    /// Non-decreasing dates with no null dates.
    pub date_sorted: bool,
    pub negative_prices: usize,
    /// Days whose volume is null or zero.
    pub zero_volume_days: usize,
    /// Consecutive-row date gaps wider than [`LARGE_GAP_DAYS`].
    pub date_gaps_over_3d: usize,
}

/// One file's validation outcome. Missing files keep their row with
/// `exists: false`; unreadable files carry the error text instead of
/// metrics.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub file: String,
    pub exists: bool,
    pub metrics: Option<QualityMetrics>,
    pub error: Option<String>,
}

/// Options controlling a validation batch.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Restrict the scan to these tickers; `None` scans the whole store.
    pub tickers: Option<Vec<String>>,
    /// Apply light repairs before computing metrics.
    pub fix: bool,
    /// Persist repaired frames back to their files.
    pub write_back: bool,
}

fn as_floats(col: &Column) -> Option<Float64Chunked> {
    col.cast(&DataType::Float64).ok()?.f64().ok().cloned()
}

/// Missing values in a column: nulls, plus NaN for float columns. A
/// missing column contributes zero; `columns_ok` reports its absence.
fn missing_count(df: &DataFrame, name: &str) -> usize {
    match df.column(name) {
        Err(_) => 0,
        Ok(col) => {
            let base = col.null_count();
            match col.f64() {
                Ok(ca) => base + ca.into_no_null_iter().filter(|v| v.is_nan()).count(),
                Err(_) => base,
            }
        }
    }
}

/// A column is empty when it is missing, entirely null, or carries only
/// zeros. Mixed null-and-value columns are not empty.
fn is_column_empty(df: &DataFrame, name: &str) -> bool {
    let Ok(col) = df.column(name) else {
        return true;
    };
    if col.null_count() == col.len() {
        return true;
    }
    if col.null_count() > 0 {
        return false;
    }
    match as_floats(col) {
        Some(values) => values.into_no_null_iter().all(|v| v == 0.0),
        None => false,
    }
}

/// Compute quality metrics for one frame. Every check tolerates missing
/// or oddly-typed columns; the worst answer is a flagged metric, never a
/// panic or an error.
pub fn check_frame(df: &DataFrame) -> QualityMetrics {
    let rows = df.height();
    let columns_ok = schema::has_required_columns(df);

    let null_open = missing_count(df, "open");
    let null_high = missing_count(df, "high");
    let null_low = missing_count(df, "low");
    let null_close = missing_count(df, "close");
    let null_adj_close = missing_count(df, "adj_close");
    let null_volume = missing_count(df, "volume");
    let has_nulls = [
        null_open,
        null_high,
        null_low,
        null_close,
        null_adj_close,
        null_volume,
    ]
    .iter()
    .any(|&c| c > 0);

    let empty_columns: Vec<String> = schema::VALUE_COLUMNS
        .iter()
        .filter(|name| is_column_empty(df, name))
        .map(|name| name.to_string())
        .collect();

    let duplicate_dates = match df.column("date") {
        Ok(col) => col
            .n_unique()
            .map(|distinct| rows.saturating_sub(distinct))
            .unwrap_or(0),
        Err(_) => 0,
    };

    let dates: Option<Vec<Option<i32>>> = df
        .column("date")
        .and_then(|c| c.date())
        .map(|ca| ca.into_iter().collect())
        .ok();

    let date_sorted = match &dates {
        Some(values) => {
            values.iter().all(|v| v.is_some()) && values.windows(2).all(|w| w[0] <= w[1])
        }
        None => false,
    };

    let date_gaps_over_3d = match &dates {
        Some(values) => values
            .windows(2)
            .filter(|w| match (w[0], w[1]) {
                (Some(a), Some(b)) => i64::from(b - a) > LARGE_GAP_DAYS,
                _ => false,
            })
            .count(),
        None => 0,
    };

    let negative_prices: usize = schema::PRICE_COLUMNS
        .iter()
        .filter_map(|name| {
            let col = df.column(name).ok()?;
            let values = as_floats(col)?;
            Some(values.into_no_null_iter().filter(|v| *v < 0.0).count())
        })
        .sum();

    let zero_volume_days = match df.column("volume").ok().and_then(as_floats) {
        Some(values) => values
            .into_iter()
            .filter(|v| match v {
                None => true,
                Some(x) => *x == 0.0 || x.is_nan(),
            })
            .count(),
        None => 0,
    };

    QualityMetrics {
        rows,
        columns_ok,
        null_open,
        null_high,
        null_low,
        null_close,
        null_adj_close,
        null_volume,
        has_nulls,
        empty_columns,
        duplicate_dates,
        date_sorted,
        negative_prices,
        zero_volume_days,
        date_gaps_over_3d,
    }
}

/// Light repairs that never alter well-formed cells: re-coerce the date
/// column to a physical Date where needed, then sort ascending by date
/// and collapse duplicate dates keeping the last occurrence.
pub fn basic_fixes(df: &DataFrame) -> Result<DataFrame, SiloError> {
    let Ok(date_col) = df.column("date") else {
        // without a date column there is nothing to sort or dedupe
        return Ok(df.clone());
    };
    let mut fixed = df.clone();
    if date_col.dtype() != &DataType::Date {
        let coerced = normalize::date_column(Some(date_col), df.height())?;
        fixed.with_column(coerced)?;
    }
    normalize::canonicalize(fixed)
}

/// Validate a set of cache files, optionally repairing them in place.
///
/// Reports come back in file-scan order (or the requested ticker order).
/// Per-file problems — a missing file, an unreadable parquet — are
/// captured in that file's report and never abort the batch.
pub fn validate_batch(
    store: &SeriesStore,
    opts: &ValidateOptions,
) -> Result<Vec<QualityReport>, SiloError> {
    let paths: Vec<PathBuf> = match &opts.tickers {
        Some(list) => list
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| store.path_for(t))
            .collect(),
        None => store.scan()?,
    };

    let mut reports = Vec::with_capacity(paths.len());
    for path in paths {
        let file = path.display().to_string();
        if !path.exists() {
            reports.push(QualityReport {
                file,
                exists: false,
                metrics: None,
                error: None,
            });
            continue;
        }
        match validate_file(&path, opts.fix, opts.write_back) {
            Ok(metrics) => reports.push(QualityReport {
                file,
                exists: true,
                metrics: Some(metrics),
                error: None,
            }),
            Err(e) => reports.push(QualityReport {
                file,
                exists: true,
                metrics: None,
                error: Some(e.to_string()),
            }),
        }
    }
    Ok(reports)
}

fn validate_file(path: &Path, fix: bool, write_back: bool) -> Result<QualityMetrics, SiloError> {
    let df = SeriesStore::read_frame(path)?;
    let df = if fix { basic_fixes(&df)? } else { df };
    if fix && write_back {
        SeriesStore::write_frame(path, &df)?;
    }
    Ok(check_frame(&df))
}

/// Render reports as CSV, one row per file in report order. Missing or
/// unreadable files keep their row with empty metric cells.
pub fn report_csv(reports: &[QualityReport]) -> Result<String, SiloError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "file",
        "exists",
        "rows",
        "columns_ok",
        "null_open",
        "null_high",
        "null_low",
        "null_close",
        "null_adj_close",
        "null_volume",
        "has_nulls",
        "empty_columns",
        "duplicate_dates",
        "date_sorted",
        "negative_prices",
        "zero_volume_days",
        "date_gaps_over_3d",
        "error",
    ])
    .map_err(|e| SiloError::Report(format!("failed to write CSV header: {e}")))?;

    for report in reports {
        let mut record = vec![report.file.clone(), report.exists.to_string()];
        if let Some(m) = &report.metrics {
            record.extend([
                m.rows.to_string(),
                m.columns_ok.to_string(),
                m.null_open.to_string(),
                m.null_high.to_string(),
                m.null_low.to_string(),
                m.null_close.to_string(),
                m.null_adj_close.to_string(),
                m.null_volume.to_string(),
                m.has_nulls.to_string(),
                m.empty_columns.join(";"),
                m.duplicate_dates.to_string(),
                m.date_sorted.to_string(),
                m.negative_prices.to_string(),
                m.zero_volume_days.to_string(),
                m.date_gaps_over_3d.to_string(),
            ]);
        } else {
            record.resize(17, String::new());
        }
        record.push(report.error.clone().unwrap_or_default());
        wtr.write_record(&record)
            .map_err(|e| SiloError::Report(format!("failed to write CSV row: {e}")))?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| SiloError::Report(format!("failed to flush CSV writer: {e}")))?;
    String::from_utf8(data).map_err(|e| SiloError::Report(format!("CSV output is not UTF-8: {e}")))
}
