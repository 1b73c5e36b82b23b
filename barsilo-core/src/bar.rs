//! Bar — one ticker-day of OHLCV data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar for a single ticker, the typed view of one cached row.
///
/// `date` is null only when the upstream value failed date coercion; the
/// validator flags such rows via its sortedness check. Prices and volume
/// are null wherever the provider sent nothing usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: Option<NaiveDate>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<i64>,
    pub ticker: String,
}

impl Bar {
    /// True when the date and every OHLCV field carry a value.
    pub fn is_complete(&self) -> bool {
        self.date.is_some()
            && self.open.is_some()
            && self.high.is_some()
            && self.low.is_some()
            && self.close.is_some()
            && self.adj_close.is_some()
            && self.volume.is_some()
    }

    /// Basic OHLC sanity: high tops every price, low floors every price.
    /// Bars with missing fields are not sane.
    pub fn is_sane(&self) -> bool {
        match (self.open, self.high, self.low, self.close) {
            (Some(o), Some(h), Some(l), Some(c)) => {
                h >= l && h >= o && h >= c && l <= o && l <= c && o > 0.0 && c > 0.0
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, 2),
            open: Some(100.0),
            high: Some(105.0),
            low: Some(98.0),
            close: Some(103.0),
            adj_close: Some(103.0),
            volume: Some(50_000),
            ticker: "SPY".into(),
        }
    }

    #[test]
    fn complete_bar_is_sane() {
        let bar = sample_bar();
        assert!(bar.is_complete());
        assert!(bar.is_sane());
    }

    #[test]
    fn missing_field_breaks_completeness() {
        let mut bar = sample_bar();
        bar.volume = None;
        assert!(!bar.is_complete());
        assert!(bar.is_sane(), "volume gaps do not affect OHLC sanity");

        bar.high = None;
        assert!(!bar.is_sane());
    }

    #[test]
    fn inverted_high_low_is_insane() {
        let mut bar = sample_bar();
        bar.high = Some(97.0); // below low
        assert!(!bar.is_sane());
    }

    #[test]
    fn serialization_roundtrip() {
        let bar = sample_bar();
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
