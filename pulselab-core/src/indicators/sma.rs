//! Simple Moving Average (SMA).
//!
//! Rolling mean over a window of `period` values, one output per window.
//! First value at index period - 1.

use super::{check_finite, check_len, check_period, Indicator, IndicatorError, IndicatorSeries};
use crate::domain::{closes, Bar};

/// SMA of an arbitrary series.
pub fn sma(values: &[f64], period: usize) -> Result<IndicatorSeries, IndicatorError> {
    check_period("sma", period)?;
    check_len("sma", values.len(), period)?;
    check_finite("sma", values)?;

    let mut out = Vec::with_capacity(values.len() + 1 - period);
    let mut sum: f64 = values[..period].iter().sum();
    out.push(sum / period as f64);

    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out.push(sum / period as f64);
    }

    Ok(IndicatorSeries::new(period - 1, out))
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Result<IndicatorSeries, IndicatorError> {
        sma(&closes(bars), self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let result = sma(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0], 5).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.start(), 4);
        assert_eq!(result.get(3), None);
        assert_approx(result.get(4).unwrap(), 12.0, DEFAULT_EPSILON);
        assert_approx(result.get(5).unwrap(), 13.0, DEFAULT_EPSILON);
        assert_approx(result.get(6).unwrap(), 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_1_is_identity() {
        let result = sma(&[100.0, 200.0, 300.0], 1).unwrap();
        assert_eq!(result.values(), &[100.0, 200.0, 300.0]);
    }

    #[test]
    fn sma_too_few_values() {
        let err = sma(&[10.0, 11.0], 5).unwrap_err();
        assert!(matches!(
            err,
            IndicatorError::InsufficientData {
                required: 5,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn sma_rejects_zero_period() {
        assert!(matches!(
            sma(&[1.0], 0),
            Err(IndicatorError::InvalidPeriod { period: 0, .. })
        ));
    }

    #[test]
    fn sma_rejects_nan() {
        assert!(matches!(
            sma(&[1.0, f64::NAN, 3.0], 2),
            Err(IndicatorError::NonFinite { index: 1, .. })
        ));
    }

    #[test]
    fn sma_indicator_over_bars() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let ind = Sma::new(3);
        assert_eq!(ind.name(), "sma_3");
        assert_eq!(ind.lookback(), 2);
        assert_approx(ind.compute(&bars).unwrap().get(2).unwrap(), 11.0, DEFAULT_EPSILON);
    }
}
