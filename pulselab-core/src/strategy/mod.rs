//! Signal generation: classifies bars into buy/sell signals.
//!
//! Generators receive only the bar history and precomputed indicator values,
//! never backtest or position state. A generator only evaluates bars at or
//! after `warmup_bars()`, and `evaluate` returns `None` whenever any
//! indicator it needs has no value at that bar, so signals are never emitted
//! against insufficient lookback.

pub mod mean_reversion;
pub mod momentum;

pub use mean_reversion::{MeanReversion, MeanReversionParams};
pub use momentum::{Momentum, MomentumParams};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, TradingSignal};
use crate::indicators::{Indicator, IndicatorError, IndicatorValues};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Indicator(#[from] IndicatorError),
    #[error("invalid {strategy} parameter: {reason}")]
    InvalidParameter {
        strategy: &'static str,
        reason: String,
    },
}

/// Trait for signal generators.
pub trait SignalGenerator: Send + Sync {
    /// Human-readable name (e.g., "mean_reversion").
    fn name(&self) -> &str;

    /// First bar index at which the generator can produce a signal.
    fn warmup_bars(&self) -> usize;

    /// Indicators that must be precomputed before evaluation.
    fn indicators(&self) -> Vec<Box<dyn Indicator>>;

    /// Evaluate one bar. Must only use data from `bars[0..=bar_index]`.
    fn evaluate(
        &self,
        bars: &[Bar],
        bar_index: usize,
        indicators: &IndicatorValues,
    ) -> Option<TradingSignal>;

    /// Precompute indicators and evaluate every bar past warm-up, in order.
    fn generate(&self, bars: &[Bar]) -> Result<Vec<TradingSignal>, StrategyError> {
        let owned = self.indicators();
        let refs: Vec<&dyn Indicator> = owned.iter().map(|i| i.as_ref()).collect();
        let values = IndicatorValues::precompute(bars, &refs)?;

        Ok((self.warmup_bars()..bars.len())
            .filter_map(|i| self.evaluate(bars, i, &values))
            .collect())
    }
}

/// Serializable strategy selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    MeanReversion(MeanReversionParams),
    Momentum(MomentumParams),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::MeanReversion(MeanReversionParams::default())
    }
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MeanReversion(_) => "mean_reversion",
            Self::Momentum(_) => "momentum",
        }
    }

    /// Validate parameters and construct the generator.
    pub fn build(&self) -> Result<Box<dyn SignalGenerator>, StrategyError> {
        Ok(match self {
            Self::MeanReversion(p) => Box::new(MeanReversion::new(p.clone())?),
            Self::Momentum(p) => Box::new(Momentum::new(p.clone())?),
        })
    }
}
