//! Forward log-return ternary labels.
//!
//! For each row the labeler looks `horizon` rows ahead within the same
//! ticker (rows ordered by date, never across tickers) and computes
//! `ln(price[i + horizon] / price[i])`. Returns above `+epsilon` label up,
//! below `-epsilon` label down, and the dead zone in between — plus rows
//! where either endpoint is missing — is indeterminate. Output rows stay
//! in the input's original order; label columns are scattered back by row
//! index.

use std::collections::BTreeMap;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::SiloError;

/// Ternary trend label for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Up,
    Down,
    Indeterminate,
}

impl Label {
    /// Classify a forward log return against the dead-zone threshold.
    /// Comparisons are strict, so a return exactly at `epsilon` is
    /// indeterminate, as are missing and NaN returns.
    pub fn from_return(ret: Option<f64>, epsilon: f64) -> Label {
        match ret {
            Some(r) if r > epsilon => Label::Up,
            Some(r) if r < -epsilon => Label::Down,
            _ => Label::Indeterminate,
        }
    }

    /// Encode for the output column: up is 1, down is 0, and the dead zone
    /// is null or 0 depending on policy.
    pub fn encode(self, policy: DeadZonePolicy) -> Option<i32> {
        match self {
            Label::Up => Some(1),
            Label::Down => Some(0),
            Label::Indeterminate => match policy {
                DeadZonePolicy::Drop => None,
                DeadZonePolicy::FillDown => Some(0),
            },
        }
    }
}

/// What to do with indeterminate rows in the encoded label column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeadZonePolicy {
    /// Leave the label null so downstream consumers can filter.
    #[default]
    Drop,
    /// Coerce to the down label (binary-classifier convenience).
    FillDown,
}

/// Labeling parameters.
#[derive(Debug, Clone)]
pub struct LabelParams {
    /// Price column the return is computed from.
    pub price_col: String,
    /// Forward distance in rows.
    pub horizon: usize,
    /// Dead-zone half-width on the log-return scale.
    pub epsilon: f64,
    pub policy: DeadZonePolicy,
    /// Partition column; `None` treats the whole frame as one series.
    /// Rows with a null group key form their own partition and are kept.
    pub group_col: Option<String>,
    /// Ordering column within each partition; null keys sort last.
    pub sort_col: String,
}

impl Default for LabelParams {
    fn default() -> Self {
        Self {
            price_col: "adj_close".to_string(),
            horizon: 1,
            epsilon: 1e-3,
            policy: DeadZonePolicy::Drop,
            group_col: Some("ticker".to_string()),
            sort_col: "date".to_string(),
        }
    }
}

/// Name of the forward-return column for a horizon, e.g. `next_1d_logret`.
pub fn return_column_name(horizon: usize) -> String {
    format!("next_{horizon}d_logret")
}

/// Forward log returns over a price sequence already in series order.
///
/// Entry `i` is `ln(prices[i + horizon] / prices[i])`, or `None` when
/// either endpoint is missing (including the last `horizon` entries).
/// Non-positive prices produce infinite or NaN returns, which the
/// classifier treats as up or indeterminate respectively.
pub fn forward_log_returns(prices: &[Option<f64>], horizon: usize) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| {
            let p0 = prices[i]?;
            let p1 = i
                .checked_add(horizon)
                .and_then(|j| prices.get(j))
                .copied()
                .flatten()?;
            Some((p1 / p0).ln())
        })
        .collect()
}

/// Attach forward-return and label columns to a frame of daily bars.
///
/// The frame is partitioned by `group_col`, each partition is ordered by
/// `sort_col` (stable, nulls last), returns and labels are computed per
/// partition, and both columns are scattered back so the output preserves
/// the input row order exactly. No rows are added or dropped.
pub fn label_frame(df: &DataFrame, params: &LabelParams) -> Result<DataFrame, SiloError> {
    let n = df.height();
    let ret_name = return_column_name(params.horizon);

    if n == 0 {
        let mut out = df.clone();
        out.with_column(Column::full_null(
            ret_name.as_str().into(),
            0,
            &DataType::Float64,
        ))?;
        out.with_column(Column::full_null("label".into(), 0, &DataType::Int32))?;
        return Ok(out);
    }

    let price_cast = df.column(&params.price_col)?.cast(&DataType::Float64)?;
    let prices: Vec<Option<f64>> = price_cast.f64()?.into_iter().collect();

    let key_col = df.column(&params.sort_col)?;
    let sort_keys: Vec<Option<i64>> = match key_col.dtype() {
        DataType::Date => key_col
            .date()?
            .into_iter()
            .map(|v| v.map(i64::from))
            .collect(),
        _ => {
            let cast = key_col.cast(&DataType::Int64)?;
            cast.i64()?.into_iter().collect()
        }
    };

    let mut groups: BTreeMap<Option<String>, Vec<usize>> = BTreeMap::new();
    match &params.group_col {
        Some(group_col) => {
            let keys = df.column(group_col)?.str()?;
            for i in 0..n {
                groups
                    .entry(keys.get(i).map(str::to_string))
                    .or_default()
                    .push(i);
            }
        }
        None => {
            groups.insert(None, (0..n).collect());
        }
    }

    let mut rets: Vec<Option<f64>> = vec![None; n];
    let mut labels: Vec<Option<i32>> = vec![None; n];

    for (_key, mut idxs) in groups {
        // null sort keys go last; ties keep input order
        idxs.sort_by_key(|&i| (sort_keys[i].unwrap_or(i64::MAX), i));

        let group_prices: Vec<Option<f64>> = idxs.iter().map(|&i| prices[i]).collect();
        let group_rets = forward_log_returns(&group_prices, params.horizon);

        for (pos, &orig) in idxs.iter().enumerate() {
            let ret = group_rets[pos];
            rets[orig] = ret;
            labels[orig] = Label::from_return(ret, params.epsilon).encode(params.policy);
        }
    }

    let mut out = df.clone();
    out.with_column(Column::new(ret_name.as_str().into(), rets))?;
    out.with_column(Column::new("label".into(), labels))?;
    Ok(out)
}
