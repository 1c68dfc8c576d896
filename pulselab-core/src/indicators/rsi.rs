//! Relative Strength Index (RSI).
//!
//! Seeds average gain and average loss with the mean of the first `period`
//! changes, then applies Wilder smoothing:
//! avg = (avg * (period - 1) + new) / period.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! First value at index `period`. avg_loss == 0 → RSI = 100.

use super::{check_finite, check_len, check_period, Indicator, IndicatorError, IndicatorSeries};
use crate::domain::{closes, Bar};

pub fn rsi(prices: &[f64], period: usize) -> Result<IndicatorSeries, IndicatorError> {
    check_period("rsi", period)?;
    check_len("rsi", prices.len(), period + 1)?;
    check_finite("rsi", prices)?;

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for &ch in &changes[..period] {
        if ch > 0.0 {
            avg_gain += ch;
        } else {
            avg_loss -= ch;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    let mut out = Vec::with_capacity(changes.len() + 1 - period);
    out.push(compute_rsi(avg_gain, avg_loss));

    let p = period as f64;
    for &ch in &changes[period..] {
        let gain = ch.max(0.0);
        let loss = (-ch).max(0.0);
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        out.push(compute_rsi(avg_gain, avg_loss));
    }

    Ok(IndicatorSeries::new(period, out))
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        (100.0 - 100.0 / (1.0 + avg_gain / avg_loss)).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Result<IndicatorSeries, IndicatorError> {
        rsi(&closes(bars), self.period)
    }
}
