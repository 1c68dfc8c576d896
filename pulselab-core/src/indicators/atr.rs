//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR is Wilder-smoothed TR, seeded with the mean of TR[1..=period].
//! First value at index `period` (needs period + 1 bars).

use super::{check_len, check_period, Indicator, IndicatorError, IndicatorSeries};
use crate::domain::Bar;

/// True Range per bar. TR[0] has no previous close and is high - low.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let range = bar.high - bar.low;
            if i == 0 {
                return range;
            }
            let pc = bars[i - 1].close;
            range.max((bar.high - pc).abs()).max((bar.low - pc).abs())
        })
        .collect()
}

pub fn atr(bars: &[Bar], period: usize) -> Result<IndicatorSeries, IndicatorError> {
    check_period("atr", period)?;
    check_len("atr", bars.len(), period + 1)?;
    if let Some(index) = bars.iter().position(|b| b.is_void()) {
        return Err(IndicatorError::NonFinite {
            indicator: "atr",
            index,
        });
    }

    let tr = true_range(bars);
    let p = period as f64;
    let mut avg = tr[1..=period].iter().sum::<f64>() / p;

    let mut out = Vec::with_capacity(bars.len() - period);
    out.push(avg);
    for &value in &tr[period + 1..] {
        avg = (avg * (p - 1.0) + value) / p;
        out.push(avg);
    }

    Ok(IndicatorSeries::new(period, out))
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Result<IndicatorSeries, IndicatorError> {
        atr(bars, self.period)
    }
}
