//! CSV loading for price bars and gas observations.
//!
//! Bars: `timestamp,open,high,low,close,volume`
//! Gas:  `timestamp,base_fee,priority_fee,total_gas,block_number,pending_tx_count,block_utilization`
//!
//! Timestamps are RFC 3339 strings or integer unix seconds. `total_gas` may be
//! left empty, in which case it is `base_fee + priority_fee`. Loaded bar series
//! are validated before being returned.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use pulselab_core::domain::{validate_series, Bar, BarError, GasDataPoint};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: unrecognised timestamp '{value}' (expected RFC 3339 or unix seconds)")]
    Timestamp { row: usize, value: String },
    #[error("invalid bar series: {0}")]
    Bars(#[from] BarError),
    #[error("no rows in input")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct GasRow {
    timestamp: String,
    base_fee: f64,
    priority_fee: f64,
    #[serde(default)]
    total_gas: Option<f64>,
    block_number: u64,
    pending_tx_count: u64,
    block_utilization: f64,
}

/// Parse an RFC 3339 timestamp or integer unix seconds.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn open(path: &Path) -> Result<File, LoadError> {
    File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn timestamp(row: usize, value: &str) -> Result<DateTime<Utc>, LoadError> {
    parse_timestamp(value).ok_or_else(|| LoadError::Timestamp {
        row,
        value: value.to_string(),
    })
}

/// Read and validate a bar series from any CSV source.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (i, record) in rdr.deserialize::<BarRow>().enumerate() {
        let row = record?;
        bars.push(Bar {
            timestamp: timestamp(i + 1, &row.timestamp)?,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    validate_series(&bars)?;
    Ok(bars)
}

pub fn load_bars_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let bars = read_bars(open(path)?)?;
    tracing::info!(path = %path.display(), bars = bars.len(), "loaded bars");
    Ok(bars)
}

/// Read gas observations. Ordering and value checks happen in the forecaster.
pub fn read_gas_points<R: Read>(reader: R) -> Result<Vec<GasDataPoint>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut points = Vec::new();
    for (i, record) in rdr.deserialize::<GasRow>().enumerate() {
        let row = record?;
        points.push(GasDataPoint {
            timestamp: timestamp(i + 1, &row.timestamp)?,
            base_fee: row.base_fee,
            priority_fee: row.priority_fee,
            total_gas: row.total_gas.unwrap_or(row.base_fee + row.priority_fee),
            block_number: row.block_number,
            pending_tx_count: row.pending_tx_count,
            block_utilization: row.block_utilization,
        });
    }
    if points.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(points)
}

pub fn load_gas_csv(path: &Path) -> Result<Vec<GasDataPoint>, LoadError> {
    let points = read_gas_points(open(path)?)?;
    tracing::info!(path = %path.display(), points = points.len(), "loaded gas points");
    Ok(points)
}

/// BLAKE3 over every bar's timestamp and OHLCV values.
///
/// Identifies the dataset a result was produced from.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&v.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
