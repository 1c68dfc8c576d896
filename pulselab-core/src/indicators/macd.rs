//! Moving Average Convergence Divergence (MACD).
//!
//! line = EMA(fast) - EMA(slow), first value at slow - 1.
//! signal = EMA(line, signal), first value at slow + signal - 2.
//! histogram = line - signal, same start as signal.
//!
//! All three series are keyed to input indices, so `line.get(i)`,
//! `signal.get(i)` and `histogram.get(i)` refer to the same bar.

use serde::{Deserialize, Serialize};

use super::ema::ema;
use super::{check_finite, check_len, Indicator, IndicatorError, IndicatorSeries};
use crate::domain::{closes, Bar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

impl MacdParams {
    pub fn validate(&self) -> Result<(), IndicatorError> {
        for period in [self.fast, self.slow, self.signal] {
            if period == 0 {
                return Err(IndicatorError::InvalidPeriod {
                    indicator: "macd",
                    period,
                });
            }
        }
        if self.fast >= self.slow {
            return Err(IndicatorError::InvalidParameter {
                indicator: "macd",
                reason: format!(
                    "fast period ({}) must be shorter than slow period ({})",
                    self.fast, self.slow
                ),
            });
        }
        Ok(())
    }

    /// Minimum input length for a histogram value.
    pub fn required_len(&self) -> usize {
        self.slow + self.signal - 1
    }

    /// Input index of the first histogram value.
    pub fn lookback(&self) -> usize {
        self.required_len() - 1
    }
}

/// MACD line, signal line and histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub line: IndicatorSeries,
    pub signal: IndicatorSeries,
    pub histogram: IndicatorSeries,
}

pub fn macd(prices: &[f64], params: MacdParams) -> Result<Macd, IndicatorError> {
    params.validate()?;
    check_len("macd", prices.len(), params.required_len())?;
    check_finite("macd", prices)?;

    let fast = ema(prices, params.fast)?;
    let slow = ema(prices, params.slow)?;

    let mut line_values = Vec::with_capacity(slow.len());
    for (i, slow_v) in slow.iter() {
        let fast_v = fast.get(i).ok_or(IndicatorError::InsufficientData {
            indicator: "macd",
            required: params.required_len(),
            actual: prices.len(),
        })?;
        line_values.push(fast_v - slow_v);
    }
    let line = IndicatorSeries::new(slow.start(), line_values);

    let signal = ema(line.values(), params.signal)?.rebased(line.start());

    let histogram_values: Vec<f64> = signal
        .iter()
        .filter_map(|(i, s)| line.get(i).map(|l| l - s))
        .collect();
    let histogram = IndicatorSeries::new(signal.start(), histogram_values);

    Ok(Macd {
        line,
        signal,
        histogram,
    })
}

/// Which MACD series an [`MacdIndicator`] exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdComponent {
    Line,
    Signal,
    Histogram,
}

/// Single-series view of MACD for use with [`super::IndicatorValues`].
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    params: MacdParams,
    component: MacdComponent,
    name: String,
}

impl MacdIndicator {
    pub fn new(params: MacdParams, component: MacdComponent) -> Self {
        let prefix = match component {
            MacdComponent::Line => "macd",
            MacdComponent::Signal => "macd_signal",
            MacdComponent::Histogram => "macd_histogram",
        };
        Self {
            params,
            component,
            name: format!(
                "{prefix}_{}_{}_{}",
                params.fast, params.slow, params.signal
            ),
        }
    }

    pub fn line(params: MacdParams) -> Self {
        Self::new(params, MacdComponent::Line)
    }

    pub fn signal(params: MacdParams) -> Self {
        Self::new(params, MacdComponent::Signal)
    }

    pub fn histogram(params: MacdParams) -> Self {
        Self::new(params, MacdComponent::Histogram)
    }
}

impl Indicator for MacdIndicator {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.component {
            MacdComponent::Line => self.params.slow.saturating_sub(1),
            MacdComponent::Signal | MacdComponent::Histogram => self.params.lookback(),
        }
    }

    fn compute(&self, bars: &[Bar]) -> Result<IndicatorSeries, IndicatorError> {
        let m = macd(&closes(bars), self.params)?;
        Ok(match self.component {
            MacdComponent::Line => m.line,
            MacdComponent::Signal => m.signal,
            MacdComponent::Histogram => m.histogram,
        })
    }
}
