//! Barsilo Core — incremental daily-bar silo: fetch, cache, validate, label.
//!
//! This crate contains the whole data pipeline:
//! - Canonical bar schema and provider-frame normalization
//! - Per-ticker parquet store with atomic writes
//! - Yahoo Finance provider behind the DataProvider trait
//! - Incremental fetch orchestration with per-ticker failure isolation
//! - Cache validation with light repairs and CSV reporting
//! - Forward log-return ternary labeling with a dead zone

pub mod bar;
pub mod error;
pub mod fetch;
pub mod labels;
pub mod normalize;
pub mod provider;
pub mod quality;
pub mod schema;
pub mod series;
pub mod store;
pub mod yahoo;

pub use bar::Bar;
pub use error::SiloError;
pub use fetch::{
    fetch_and_cache, FetchOptions, FetchProgress, FetchSummary, StdoutProgress, TickerOutcome,
};
pub use labels::{label_frame, DeadZonePolicy, Label, LabelParams};
pub use normalize::{merge_frames, normalize};
pub use provider::DataProvider;
pub use quality::{
    check_frame, report_csv, validate_batch, QualityMetrics, QualityReport, ValidateOptions,
};
pub use series::TickerSeries;
pub use store::SeriesStore;
pub use yahoo::YahooDaily;
