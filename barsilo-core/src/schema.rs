//! Canonical column layout for cached bar frames.
//!
//! Every per-ticker parquet file holds exactly these columns, in this order:
//! `date`, `open`, `high`, `low`, `close`, `adj_close`, `volume`, `ticker`.
//! Prices are nullable Float64, volume is nullable Int64, and `date` is a
//! physical Date column (no intraday component survives normalization).

use polars::prelude::*;

use crate::error::SiloError;

/// All canonical columns, in storage order.
pub const COLUMNS: [&str; 8] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "adj_close",
    "volume",
    "ticker",
];

/// The five price columns (nullable Float64).
pub const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "adj_close"];

/// Price columns plus volume; the columns the validator inspects for
/// missing values and degenerate content.
pub const VALUE_COLUMNS: [&str; 6] = ["open", "high", "low", "close", "adj_close", "volume"];

/// The canonical schema for a cached bar frame.
pub fn schema() -> Schema {
    Schema::from_iter(vec![
        Field::new("date".into(), DataType::Date),
        Field::new("open".into(), DataType::Float64),
        Field::new("high".into(), DataType::Float64),
        Field::new("low".into(), DataType::Float64),
        Field::new("close".into(), DataType::Float64),
        Field::new("adj_close".into(), DataType::Float64),
        Field::new("volume".into(), DataType::Int64),
        Field::new("ticker".into(), DataType::String),
    ])
}

/// A zero-row frame with the canonical columns and dtypes.
pub fn empty_frame() -> Result<DataFrame, SiloError> {
    let columns = vec![
        Column::new_empty("date".into(), &DataType::Date),
        Column::new_empty("open".into(), &DataType::Float64),
        Column::new_empty("high".into(), &DataType::Float64),
        Column::new_empty("low".into(), &DataType::Float64),
        Column::new_empty("close".into(), &DataType::Float64),
        Column::new_empty("adj_close".into(), &DataType::Float64),
        Column::new_empty("volume".into(), &DataType::Int64),
        Column::new_empty("ticker".into(), &DataType::String),
    ];
    Ok(DataFrame::new(columns)?)
}

/// True when every canonical column is present, regardless of order or
/// extra columns.
pub fn has_required_columns(df: &DataFrame) -> bool {
    COLUMNS.iter().all(|name| df.column(name).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_has_all_columns_in_order() {
        let s = schema();
        let names: Vec<&str> = s.iter_names().map(|n| n.as_str()).collect();
        assert_eq!(names, COLUMNS.to_vec());
    }

    #[test]
    fn empty_frame_matches_schema() {
        let df = empty_frame().unwrap();
        assert_eq!(df.height(), 0);
        for (i, name) in COLUMNS.iter().enumerate() {
            assert_eq!(df.get_columns()[i].name().as_str(), *name);
        }
        assert_eq!(
            df.column("date").unwrap().dtype(),
            &DataType::Date,
            "date must be a physical Date column"
        );
        assert_eq!(df.column("volume").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("ticker").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn required_columns_check() {
        let df = empty_frame().unwrap();
        assert!(has_required_columns(&df));

        let partial = df.drop("volume").unwrap();
        assert!(!has_required_columns(&partial));
    }
}
