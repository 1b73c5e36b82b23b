//! Data provider trait.
//!
//! The DataProvider trait abstracts over daily-bar sources (Yahoo Finance
//! in production, scripted frames in tests) so the fetch pipeline can be
//! exercised without the network. Providers return raw frames in whatever
//! column shape the source uses; normalization happens downstream.

use chrono::NaiveDate;
use polars::prelude::DataFrame;

use crate::error::SiloError;

/// Trait for daily-bar providers.
///
/// Implementations handle the specifics of one source. The cache layer
/// sits above this trait — providers don't know about the store.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for a ticker over `[start, end)`.
    ///
    /// The end date is exclusive. A range the source has no data for is a
    /// success with an empty frame, not an error.
    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate)
        -> Result<DataFrame, SiloError>;
}
