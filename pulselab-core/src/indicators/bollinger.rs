//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(period)
//! - Upper: middle + mult * stddev(window)
//! - Lower: middle - mult * stddev(window)
//!
//! Uses population stddev (divide by N). First value at index period - 1.

use super::{check_finite, check_len, check_period, Indicator, IndicatorError, IndicatorSeries};
use crate::domain::{closes, Bar};

/// Which band of the Bollinger Bands to expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

/// Upper, middle and lower bands, index-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: IndicatorSeries,
    pub middle: IndicatorSeries,
    pub lower: IndicatorSeries,
}

impl BollingerBands {
    /// %B at `index`: 0 at the lower band, 1 at the upper band.
    /// None when the bands are not available or have zero width.
    pub fn percent_b(&self, index: usize, price: f64) -> Option<f64> {
        let upper = self.upper.get(index)?;
        let lower = self.lower.get(index)?;
        let width = upper - lower;
        if width <= 0.0 {
            return None;
        }
        Some((price - lower) / width)
    }
}

pub fn bollinger(
    prices: &[f64],
    period: usize,
    multiplier: f64,
) -> Result<BollingerBands, IndicatorError> {
    check_period("bollinger", period)?;
    if !(multiplier.is_finite() && multiplier > 0.0) {
        return Err(IndicatorError::InvalidParameter {
            indicator: "bollinger",
            reason: format!("multiplier must be positive and finite, got {multiplier}"),
        });
    }
    check_len("bollinger", prices.len(), period)?;
    check_finite("bollinger", prices)?;

    let n = prices.len() + 1 - period;
    let mut upper = Vec::with_capacity(n);
    let mut middle = Vec::with_capacity(n);
    let mut lower = Vec::with_capacity(n);

    for window in prices.windows(period) {
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|p| {
                let diff = p - mean;
                diff * diff
            })
            .sum::<f64>()
            / period as f64;
        let stddev = variance.sqrt();

        upper.push(mean + multiplier * stddev);
        middle.push(mean);
        lower.push(mean - multiplier * stddev);
    }

    let start = period - 1;
    Ok(BollingerBands {
        upper: IndicatorSeries::new(start, upper),
        middle: IndicatorSeries::new(start, middle),
        lower: IndicatorSeries::new(start, lower),
    })
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        let prefix = match band {
            BollingerBand::Upper => "bollinger_upper",
            BollingerBand::Middle => "bollinger_middle",
            BollingerBand::Lower => "bollinger_lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("{prefix}_{period}_{multiplier}"),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Upper)
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Middle)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Lower)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Result<IndicatorSeries, IndicatorError> {
        let bands = bollinger(&closes(bars), self.period, self.multiplier)?;
        Ok(match self.band {
            BollingerBand::Upper => bands.upper,
            BollingerBand::Middle => bands.middle,
            BollingerBand::Lower => bands.lower,
        })
    }
}
