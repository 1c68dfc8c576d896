//! Momentum signal: RSI extreme confirmed by a MACD histogram crossover.
//!
//! Buy when RSI < oversold and the histogram crosses from <= 0 on the previous
//! bar to > 0 on this bar. Sell when RSI > overbought and the histogram
//! crosses from >= 0 to < 0. The crossover is an edge trigger: only the bar
//! where the sign changes fires, never every bar while the histogram stays on
//! one side.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{SignalGenerator, StrategyError};
use crate::domain::{Bar, SignalKind, TradingSignal};
use crate::indicators::{Indicator, IndicatorValues, MacdIndicator, MacdParams, Rsi};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumParams {
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for MomentumParams {
    fn default() -> Self {
        let macd = MacdParams::default();
        Self {
            rsi_period: 14,
            oversold: 30.0,
            overbought: 70.0,
            macd_fast: macd.fast,
            macd_slow: macd.slow,
            macd_signal: macd.signal,
        }
    }
}

impl MomentumParams {
    pub fn macd(&self) -> MacdParams {
        MacdParams {
            fast: self.macd_fast,
            slow: self.macd_slow,
            signal: self.macd_signal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Momentum {
    params: MomentumParams,
    rsi_key: String,
    histogram_key: String,
}

impl Momentum {
    pub fn new(params: MomentumParams) -> Result<Self, StrategyError> {
        let invalid = |reason: String| StrategyError::InvalidParameter {
            strategy: "momentum",
            reason,
        };
        if params.rsi_period == 0 {
            return Err(invalid("rsi_period must be >= 1".into()));
        }
        if !(0.0..=100.0).contains(&params.oversold) || !(0.0..=100.0).contains(&params.overbought)
        {
            return Err(invalid(format!(
                "thresholds must lie in [0, 100], got oversold={} overbought={}",
                params.oversold, params.overbought
            )));
        }
        if params.oversold >= params.overbought {
            return Err(invalid(format!(
                "oversold ({}) must be below overbought ({})",
                params.oversold, params.overbought
            )));
        }
        params.macd().validate()?;

        Ok(Self {
            rsi_key: Rsi::new(params.rsi_period).name().to_string(),
            histogram_key: MacdIndicator::histogram(params.macd()).name().to_string(),
            params,
        })
    }

    pub fn params(&self) -> &MomentumParams {
        &self.params
    }
}

impl SignalGenerator for Momentum {
    fn name(&self) -> &str {
        "momentum"
    }

    fn warmup_bars(&self) -> usize {
        // Crossover needs the previous bar's histogram as well.
        self.params
            .rsi_period
            .max(self.params.macd().lookback() + 1)
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![
            Box::new(Rsi::new(self.params.rsi_period)),
            Box::new(MacdIndicator::histogram(self.params.macd())),
        ]
    }

    fn evaluate(
        &self,
        bars: &[Bar],
        bar_index: usize,
        indicators: &IndicatorValues,
    ) -> Option<TradingSignal> {
        if bar_index < self.warmup_bars() {
            return None;
        }
        let bar = bars.get(bar_index)?;
        let rsi = indicators.get(&self.rsi_key, bar_index)?;
        let hist = indicators.get(&self.histogram_key, bar_index)?;
        let prev_hist = indicators.get(&self.histogram_key, bar_index - 1)?;

        let p = &self.params;
        let (kind, depth) = if rsi < p.oversold && prev_hist <= 0.0 && hist > 0.0 {
            let depth = if p.oversold > 0.0 {
                (p.oversold - rsi) / p.oversold
            } else {
                0.0
            };
            (SignalKind::Buy, depth)
        } else if rsi > p.overbought && prev_hist >= 0.0 && hist < 0.0 {
            let room = 100.0 - p.overbought;
            let depth = if room > 0.0 {
                (rsi - p.overbought) / room
            } else {
                0.0
            };
            (SignalKind::Sell, depth)
        } else {
            return None;
        };

        let mut snapshot = BTreeMap::new();
        snapshot.insert("rsi".to_string(), rsi);
        snapshot.insert("macd_histogram".to_string(), hist);
        snapshot.insert("macd_histogram_prev".to_string(), prev_hist);

        Some(TradingSignal {
            kind,
            bar_index,
            timestamp: bar.timestamp,
            price: bar.close,
            strength: (50.0 + 50.0 * depth).clamp(0.0, 100.0),
            confidence: (60.0 + 40.0 * depth).clamp(0.0, 100.0),
            indicators: snapshot,
        })
    }
}
