//! Error types shared across the fetch, store, and validation layers.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors that can occur while fetching, caching, or validating bar data.
#[derive(Debug, Error)]
pub enum SiloError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("malformed provider response: {0}")]
    BadResponse(String),

    #[error("ticker not found: {ticker}")]
    TickerNotFound { ticker: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("report error: {0}")]
    Report(String),

    #[error("dataframe error: {0}")]
    Polars(#[from] PolarsError),

    #[error("data error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = SiloError::TickerNotFound {
            ticker: "ZZZZ".to_string(),
        };
        assert_eq!(err.to_string(), "ticker not found: ZZZZ");

        let err = SiloError::RateLimited {
            retry_after_secs: 60,
        };
        assert!(err.to_string().contains("60"));

        let err = SiloError::Store("disk full".to_string());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn polars_errors_convert() {
        let polars_err = PolarsError::NoData("frame is empty".into());
        let err: SiloError = polars_err.into();
        assert!(matches!(err, SiloError::Polars(_)));
    }
}
