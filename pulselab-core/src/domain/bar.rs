//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for one time interval.
///
/// Bars are immutable once recorded. A series must be time-ascending with no
/// duplicate timestamps; see [`validate_series`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLCV field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }

    /// Basic OHLCV sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close > 0.0
            && self.volume >= 0.0
    }
}

/// Problems found when validating a bar series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar series is empty")]
    Empty,
    #[error("bar {index} has non-finite or inconsistent OHLCV values")]
    Malformed { index: usize },
    #[error("bar {index} timestamp {timestamp} is not after the previous bar")]
    NotAscending {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Check that a bar series is non-empty, sane, and strictly time-ascending.
pub fn validate_series(bars: &[Bar]) -> Result<(), BarError> {
    if bars.is_empty() {
        return Err(BarError::Empty);
    }
    for (index, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(BarError::Malformed { index });
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(BarError::NotAscending {
                index,
                timestamp: bar.timestamp,
            });
        }
    }
    Ok(())
}

/// Extract close prices from a bar series.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_bar(day: i64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::days(day),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar(0).is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar(0);
        bar.open = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar(0);
        bar.high = 97.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn series_rejects_duplicate_timestamp() {
        let bars = vec![sample_bar(0), sample_bar(1), sample_bar(1)];
        assert!(matches!(
            validate_series(&bars),
            Err(BarError::NotAscending { index: 2, .. })
        ));
    }

    #[test]
    fn series_rejects_empty() {
        assert_eq!(validate_series(&[]), Err(BarError::Empty));
    }

    #[test]
    fn series_accepts_ascending() {
        let bars: Vec<Bar> = (0..5).map(sample_bar).collect();
        assert!(validate_series(&bars).is_ok());
        assert_eq!(closes(&bars), vec![103.0; 5]);
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar(3);
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
