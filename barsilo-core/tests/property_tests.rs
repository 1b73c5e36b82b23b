//! Property tests for cache and labeling invariants.
//!
//! Uses proptest to verify:
//! 1. Merge canonical form — merged frames are date-sorted and duplicate-free,
//!    and the incoming side wins every overlap
//! 2. Merge idempotence — replaying the same rows changes nothing
//! 3. Label locality — labels never read across a series end or across tickers

use std::collections::BTreeMap;

use barsilo_core::labels::{label_frame, LabelParams};
use barsilo_core::normalize::merge_frames;
use barsilo_core::series::TickerSeries;
use barsilo_core::Bar;
use chrono::NaiveDate;
use polars::prelude::*;
use proptest::prelude::*;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

/// Day-offset → close, so dates are unique and ordered by construction.
fn arb_series() -> impl Strategy<Value = BTreeMap<i64, f64>> {
    prop::collection::btree_map(
        0i64..120,
        (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0),
        1..25,
    )
}

fn frame_from(ticker: &str, rows: &BTreeMap<i64, f64>) -> DataFrame {
    let bars: Vec<Bar> = rows
        .iter()
        .map(|(&offset, &close)| Bar {
            date: Some(base_date() + chrono::Duration::days(offset)),
            open: Some(close),
            high: Some(close + 1.0),
            low: Some(close - 1.0),
            close: Some(close),
            adj_close: Some(close),
            volume: Some(1_000),
            ticker: ticker.to_string(),
        })
        .collect();
    TickerSeries::from_bars(ticker, &bars).unwrap().into_frame()
}

fn dates_of(df: &DataFrame) -> Vec<i32> {
    df.column("date")
        .unwrap()
        .date()
        .unwrap()
        .into_iter()
        .flatten()
        .collect()
}

fn labels_of(df: &DataFrame) -> Vec<Option<i32>> {
    df.column("label").unwrap().i32().unwrap().into_iter().collect()
}

fn close_by_date(df: &DataFrame) -> BTreeMap<i32, f64> {
    let dates = dates_of(df);
    let closes: Vec<f64> = df
        .column("close")
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    dates.into_iter().zip(closes).collect()
}

// ── 1. Merge Canonical Form ──────────────────────────────────────────

proptest! {
    /// Merging any two series yields strictly increasing dates covering
    /// exactly the union of input dates.
    #[test]
    fn merge_is_sorted_and_duplicate_free(a in arb_series(), b in arb_series()) {
        let merged = merge_frames(&frame_from("T", &a), &frame_from("T", &b)).unwrap();

        let dates = dates_of(&merged);
        prop_assert!(dates.windows(2).all(|w| w[0] < w[1]));

        let union: std::collections::BTreeSet<i64> =
            a.keys().chain(b.keys()).copied().collect();
        prop_assert_eq!(dates.len(), union.len());
    }

    /// Where both sides hold the same date, the merged value is the
    /// incoming one.
    #[test]
    fn merge_overlap_takes_the_incoming_row(a in arb_series(), b in arb_series()) {
        let merged = merge_frames(&frame_from("T", &a), &frame_from("T", &b)).unwrap();
        let merged_closes = close_by_date(&merged);
        let incoming_closes = close_by_date(&frame_from("T", &b));

        for (date, close) in &incoming_closes {
            prop_assert_eq!(merged_closes.get(date), Some(close));
        }
    }
}

// ── 2. Merge Idempotence ─────────────────────────────────────────────

proptest! {
    /// Re-applying the same incoming rows leaves the series untouched.
    #[test]
    fn remerging_the_same_rows_changes_nothing(a in arb_series(), b in arb_series()) {
        let incoming = frame_from("T", &b);
        let once = merge_frames(&frame_from("T", &a), &incoming).unwrap();
        let twice = merge_frames(&once, &incoming).unwrap();

        let d1 = TickerSeries::new("T", once).digest().unwrap();
        let d2 = TickerSeries::new("T", twice).digest().unwrap();
        prop_assert_eq!(d1, d2);
    }
}

// ── 3. Label Locality ────────────────────────────────────────────────

proptest! {
    /// The final `horizon` rows of a series can have no forward return, so
    /// their labels are always null.
    #[test]
    fn labels_stop_at_the_series_end(rows in arb_series(), horizon in 1usize..5) {
        let frame = frame_from("T", &rows);
        let params = LabelParams {
            horizon,
            ..LabelParams::default()
        };
        let labeled = label_frame(&frame, &params).unwrap();

        let labels = labels_of(&labeled);
        let n = labels.len();
        let tail = horizon.min(n);
        for label in &labels[n - tail..] {
            prop_assert_eq!(*label, None);
        }
    }

    /// Labeling a stacked two-ticker frame matches labeling each ticker
    /// frame on its own.
    #[test]
    fn grouped_labeling_matches_per_ticker_labeling(
        a in arb_series(),
        b in arb_series(),
    ) {
        let frame_a = frame_from("AAA", &a);
        let frame_b = frame_from("BBB", &b);
        let mut combined = frame_a.clone();
        combined.vstack_mut(&frame_b).unwrap();

        let params = LabelParams::default();
        let together = labels_of(&label_frame(&combined, &params).unwrap());
        let mut separate = labels_of(&label_frame(&frame_a, &params).unwrap());
        separate.extend(labels_of(&label_frame(&frame_b, &params).unwrap()));

        prop_assert_eq!(together, separate);
    }
}
