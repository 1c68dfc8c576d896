//! Mean-reversion signal: price outside the Bollinger Bands.
//!
//! Buy when close <= lower band, sell when close >= upper band. Strength and
//! confidence grow with how far outside the band the close is, measured in
//! band widths (%B below 0 or above 1). Bars with zero band width are skipped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{SignalGenerator, StrategyError};
use crate::domain::{Bar, SignalKind, TradingSignal};
use crate::indicators::{Bollinger, Indicator, IndicatorValues};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionParams {
    pub period: usize,
    pub std_dev_multiplier: f64,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeanReversion {
    params: MeanReversionParams,
    upper_key: String,
    middle_key: String,
    lower_key: String,
}

impl MeanReversion {
    pub fn new(params: MeanReversionParams) -> Result<Self, StrategyError> {
        if params.period < 2 {
            return Err(StrategyError::InvalidParameter {
                strategy: "mean_reversion",
                reason: format!("period must be >= 2, got {}", params.period),
            });
        }
        if !(params.std_dev_multiplier.is_finite() && params.std_dev_multiplier > 0.0) {
            return Err(StrategyError::InvalidParameter {
                strategy: "mean_reversion",
                reason: format!(
                    "std_dev_multiplier must be positive and finite, got {}",
                    params.std_dev_multiplier
                ),
            });
        }
        let (p, m) = (params.period, params.std_dev_multiplier);
        Ok(Self {
            upper_key: Bollinger::upper(p, m).name().to_string(),
            middle_key: Bollinger::middle(p, m).name().to_string(),
            lower_key: Bollinger::lower(p, m).name().to_string(),
            params,
        })
    }

    pub fn params(&self) -> &MeanReversionParams {
        &self.params
    }
}

impl SignalGenerator for MeanReversion {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn warmup_bars(&self) -> usize {
        self.params.period - 1
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        let (p, m) = (self.params.period, self.params.std_dev_multiplier);
        vec![
            Box::new(Bollinger::upper(p, m)),
            Box::new(Bollinger::middle(p, m)),
            Box::new(Bollinger::lower(p, m)),
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
        let upper = indicators.get(&self.upper_key, bar_index)?;
        let middle = indicators.get(&self.middle_key, bar_index)?;
        let lower = indicators.get(&self.lower_key, bar_index)?;

        let width = upper - lower;
        if width <= 0.0 {
            return None;
        }
        let percent_b = (bar.close - lower) / width;

        let (kind, excess) = if bar.close <= lower {
            (SignalKind::Buy, -percent_b)
        } else if bar.close >= upper {
            (SignalKind::Sell, percent_b - 1.0)
        } else {
            return None;
        };

        let mut snapshot = BTreeMap::new();
        snapshot.insert("bb_upper".to_string(), upper);
        snapshot.insert("bb_middle".to_string(), middle);
        snapshot.insert("bb_lower".to_string(), lower);
        snapshot.insert("percent_b".to_string(), percent_b);

        Some(TradingSignal {
            kind,
            bar_index,
            timestamp: bar.timestamp,
            price: bar.close,
            strength: (50.0 + 100.0 * excess).clamp(0.0, 100.0),
            confidence: (60.0 + 80.0 * excess).clamp(0.0, 95.0),
            indicators: snapshot,
        })
    }
}
