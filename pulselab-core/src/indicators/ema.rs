//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = k * value[t] + (1 - k) * EMA[t-1], k = 2 / (period + 1).
//! Seed: EMA[period-1] = SMA of the first `period` values.

use super::{check_finite, check_len, check_period, Indicator, IndicatorError, IndicatorSeries};
use crate::domain::{closes, Bar};

/// Period-based EMA of an arbitrary series.
pub fn ema(values: &[f64], period: usize) -> Result<IndicatorSeries, IndicatorError> {
    check_period("ema", period)?;
    check_len("ema", values.len(), period)?;
    check_finite("ema", values)?;

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() + 1 - period);
    out.push(seed);
    let mut prev = seed;
    for &v in &values[period..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }

    Ok(IndicatorSeries::new(period - 1, out))
}

/// Smoothing-factor EMA seeded with the first value.
///
/// One output per input; `alpha` must lie in (0, 1].
pub fn ema_alpha(values: &[f64], alpha: f64) -> Result<IndicatorSeries, IndicatorError> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(IndicatorError::InvalidParameter {
            indicator: "ema_alpha",
            reason: format!("alpha must be in (0, 1], got {alpha}"),
        });
    }
    check_len("ema_alpha", values.len(), 1)?;
    check_finite("ema_alpha", values)?;

    let mut out = Vec::with_capacity(values.len());
    let mut prev = values[0];
    out.push(prev);
    for &v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }
    Ok(IndicatorSeries::new(0, out))
}

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Result<IndicatorSeries, IndicatorError> {
        ema(&closes(bars), self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn ema_period_1_equals_input() {
        let result = ema(&[100.0, 200.0, 300.0], 1).unwrap();
        assert_eq!(result.start(), 0);
        assert_eq!(result.values(), &[100.0, 200.0, 300.0]);
    }

    #[test]
    fn ema_3_known_values() {
        // k = 0.5, seed at index 2 = SMA(10,11,12) = 11
        // EMA[3] = 0.5*13 + 0.5*11 = 12, EMA[4] = 0.5*14 + 0.5*12 = 13
        let result = ema(&[10.0, 11.0, 12.0, 13.0, 14.0], 3).unwrap();
        assert_eq!(result.get(1), None);
        assert_approx(result.get(2).unwrap(), 11.0, DEFAULT_EPSILON);
        assert_approx(result.get(3).unwrap(), 12.0, DEFAULT_EPSILON);
        assert_approx(result.get(4).unwrap(), 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_constant_series_is_constant() {
        let result = ema(&[42.0; 50], 10).unwrap();
        for (_, v) in result.iter() {
            assert_approx(v, 42.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn ema_insufficient_data() {
        assert!(matches!(
            ema(&[1.0, 2.0], 3),
            Err(IndicatorError::InsufficientData { required: 3, .. })
        ));
    }

    #[test]
    fn ema_alpha_known_values() {
        // seed 10, then 0.3*20 + 0.7*10 = 13, then 0.3*20 + 0.7*13 = 15.1
        let result = ema_alpha(&[10.0, 20.0, 20.0], 0.3).unwrap();
        assert_eq!(result.start(), 0);
        assert_approx(result.get(1).unwrap(), 13.0, DEFAULT_EPSILON);
        assert_approx(result.get(2).unwrap(), 15.1, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_alpha_rejects_bad_alpha() {
        assert!(ema_alpha(&[1.0], 0.0).is_err());
        assert!(ema_alpha(&[1.0], 1.5).is_err());
        assert!(ema_alpha(&[1.0], f64::NAN).is_err());
        assert!(ema_alpha(&[], 0.3).is_err());
    }

    #[test]
    fn ema_indicator_matches_series_fn() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let from_bars = Ema::new(3).compute(&bars).unwrap();
        let from_series = ema(&closes, 3).unwrap();
        assert_eq!(from_bars, from_series);
        assert_eq!(Ema::new(20).lookback(), 19);
    }
}
