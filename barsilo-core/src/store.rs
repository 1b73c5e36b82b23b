//! On-disk parquet store, one file per ticker.
//!
//! Files live flat under the data directory as `{TICKER}.parquet` and hold
//! the canonical column layout. Writes go through a sibling temp file and a
//! rename, so a crash mid-write never leaves a truncated cache file.

use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::error::SiloError;
use crate::schema;
use crate::series::TickerSeries;

#[derive(Debug, Clone)]
pub struct SeriesStore {
    data_dir: PathBuf,
}

impl SeriesStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The cache file for a ticker: `{data_dir}/{TICKER}.parquet`.
    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.parquet", ticker.trim().to_uppercase()))
    }

    pub fn exists(&self, ticker: &str) -> bool {
        self.path_for(ticker).exists()
    }

    pub fn ensure_dir(&self) -> Result<(), SiloError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            SiloError::Store(format!(
                "failed to create {}: {e}",
                self.data_dir.display()
            ))
        })
    }

    /// Load one ticker's series, or `None` when no cache file exists yet.
    pub fn load(&self, ticker: &str) -> Result<Option<TickerSeries>, SiloError> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Ok(None);
        }
        let df = Self::read_frame(&path)?;
        Ok(Some(TickerSeries::new(ticker, df)))
    }

    pub fn load_or_empty(&self, ticker: &str) -> Result<TickerSeries, SiloError> {
        match self.load(ticker)? {
            Some(series) => Ok(series),
            None => TickerSeries::empty(ticker),
        }
    }

    /// Persist a series to its cache file. Returns the written path.
    pub fn write(&self, series: &TickerSeries) -> Result<PathBuf, SiloError> {
        self.ensure_dir()?;
        let path = self.path_for(series.ticker());
        Self::write_frame(&path, series.frame())?;
        Ok(path)
    }

    pub fn read_frame(path: &Path) -> Result<DataFrame, SiloError> {
        let file = fs::File::open(path)
            .map_err(|e| SiloError::Store(format!("failed to open {}: {e}", path.display())))?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| SiloError::Store(format!("failed to read {}: {e}", path.display())))
    }

    /// Write a frame to `path` atomically: parquet bytes go to a sibling
    /// temp file which is then renamed over the target.
    pub fn write_frame(path: &Path, df: &DataFrame) -> Result<(), SiloError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    SiloError::Store(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
        }
        let tmp_path = path.with_extension("parquet.tmp");
        let file = fs::File::create(&tmp_path).map_err(|e| {
            SiloError::Store(format!("failed to create {}: {e}", tmp_path.display()))
        })?;
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut df.clone())
            .map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                SiloError::Store(format!("failed to write {}: {e}", tmp_path.display()))
            })?;
        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            SiloError::Store(format!("atomic rename failed for {}: {e}", path.display()))
        })?;
        Ok(())
    }

    /// Every parquet file in the store, sorted by file name. A missing data
    /// directory is just an empty store.
    pub fn scan(&self) -> Result<Vec<PathBuf>, SiloError> {
        if !self.data_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.data_dir).map_err(|e| {
            SiloError::Store(format!("failed to read {}: {e}", self.data_dir.display()))
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SiloError::Store(format!("failed to read {}: {e}", self.data_dir.display()))
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("parquet") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Stack every stored series (or just `tickers`, when given) into one
    /// frame. Requested tickers without a cache file are skipped.
    pub fn load_all(&self, tickers: Option<&[String]>) -> Result<DataFrame, SiloError> {
        let mut acc = schema::empty_frame()?;
        match tickers {
            Some(list) => {
                for ticker in list {
                    if let Some(series) = self.load(ticker)? {
                        acc.vstack_mut(series.frame())?;
                    }
                }
            }
            None => {
                for path in self.scan()? {
                    let df = Self::read_frame(&path)?;
                    acc.vstack_mut(&df)?;
                }
            }
        }
        Ok(acc)
    }
}
