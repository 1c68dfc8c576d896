//! Technical indicator library.
//!
//! Every indicator is a pure function over a numeric (or bar) series that
//! returns an [`IndicatorSeries`]: the computed values plus the input index of
//! the first value. Consumers join series by bar index through
//! [`IndicatorSeries::get`], never by positional offsets, so series of
//! different warm-up lengths (MACD line, signal, histogram, RSI, bands) always
//! line up with the bar they were computed for.
//!
//! Input shorter than an indicator's warm-up window is rejected with
//! [`IndicatorError::InsufficientData`].

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use atr::{atr, true_range, Atr};
pub use bollinger::{bollinger, Bollinger, BollingerBand, BollingerBands};
pub use ema::{ema, ema_alpha, Ema};
pub use macd::{macd, Macd, MacdComponent, MacdIndicator, MacdParams};
pub use rsi::{rsi, Rsi};
pub use sma::{sma, Sma};

use crate::domain::Bar;
use std::collections::HashMap;
use thiserror::Error;

/// Failures of indicator computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("{indicator}: need at least {required} values, got {actual}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        actual: usize,
    },
    #[error("{indicator}: period must be >= 1 (got {period})")]
    InvalidPeriod {
        indicator: &'static str,
        period: usize,
    },
    #[error("{indicator}: {reason}")]
    InvalidParameter {
        indicator: &'static str,
        reason: String,
    },
    #[error("{indicator}: non-finite input at index {index}")]
    NonFinite {
        indicator: &'static str,
        index: usize,
    },
}

/// Output of an indicator, keyed to input indices.
///
/// `values[k]` belongs to input index `start + k`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndicatorSeries {
    start: usize,
    values: Vec<f64>,
}

impl IndicatorSeries {
    pub fn new(start: usize, values: Vec<f64>) -> Self {
        Self { start, values }
    }

    /// Input index of the first value.
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the input index of the last value.
    pub fn end(&self) -> usize {
        self.start + self.values.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value aligned to input index `index`, if the indicator covers it.
    pub fn get(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(self.start)
            .and_then(|k| self.values.get(k).copied())
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// `(input_index, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(k, &v)| (self.start + k, v))
    }

    /// Re-key a series computed over a sub-slice that began at input index `base`.
    pub(crate) fn rebased(self, base: usize) -> Self {
        Self {
            start: self.start + base,
            values: self.values,
        }
    }
}

/// Trait for indicators computed from a bar series.
///
/// Indicators are precomputed once per run and looked up by name and bar
/// index through [`IndicatorValues`]. No value at bar t may depend on data
/// from bar t+1 or later.
pub trait Indicator: Send + Sync {
    /// Unique name including parameters (e.g., "sma_20", "rsi_14").
    fn name(&self) -> &str;

    /// Index of the first bar with a value.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Result<IndicatorSeries, IndicatorError>;
}

/// Container for precomputed indicator series, keyed by indicator name.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, IndicatorSeries>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute every indicator over `bars`.
    pub fn precompute(
        bars: &[Bar],
        indicators: &[&dyn Indicator],
    ) -> Result<Self, IndicatorError> {
        let mut values = Self::new();
        for indicator in indicators {
            values.insert(indicator.name(), indicator.compute(bars)?);
        }
        Ok(values)
    }

    pub fn insert(&mut self, name: impl Into<String>, series: IndicatorSeries) {
        self.series.insert(name.into(), series);
    }

    /// Value of a named indicator at a bar index.
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series.get(name).and_then(|s| s.get(bar_index))
    }

    pub fn get_series(&self, name: &str) -> Option<&IndicatorSeries> {
        self.series.get(name)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

pub(crate) fn check_period(indicator: &'static str, period: usize) -> Result<(), IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod { indicator, period });
    }
    Ok(())
}

pub(crate) fn check_len(
    indicator: &'static str,
    actual: usize,
    required: usize,
) -> Result<(), IndicatorError> {
    if actual < required {
        return Err(IndicatorError::InsufficientData {
            indicator,
            required,
            actual,
        });
    }
    Ok(())
}

pub(crate) fn check_finite(indicator: &'static str, values: &[f64]) -> Result<(), IndicatorError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(IndicatorError::NonFinite { indicator, index }),
        None => Ok(()),
    }
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for first bar), high = max(open,close) + 1.0,
/// low = min(open,close) - 1.0, one bar per day.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
