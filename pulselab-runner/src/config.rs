//! Serializable run configuration, loaded from TOML.
//!
//! ```toml
//! [backtest]
//! initial_capital = 10000.0
//! stop_loss_pct = 5.0
//!
//! [strategy]
//! type = "mean_reversion"
//! period = 20
//!
//! [optimize.ranges]
//! period = [10, 20]
//!
//! [gas]
//! ema_alpha = 0.3
//! ```
//!
//! Every section is optional and falls back to its defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pulselab_core::backtest::{ParamsError, StrategyParams};
use pulselab_core::gas::{GasError, GasForecastConfig};
use pulselab_core::strategy::{StrategyConfig, StrategyError};

use crate::optimizer::ParamGrid;

/// Content hash identifying a configuration.
pub type ConfigId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid [backtest] section: {0}")]
    Params(#[from] ParamsError),
    #[error("invalid [strategy] section: {0}")]
    Strategy(#[from] StrategyError),
    #[error("invalid [gas] section: {0}")]
    Gas(#[from] GasError),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Grid-search settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    pub ranges: ParamGrid,
}

/// Everything needed to reproduce a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub backtest: StrategyParams,
    pub strategy: StrategyConfig,
    pub optimize: OptimizeConfig,
    pub gas: GasForecastConfig,
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section without running anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backtest.validate()?;
        self.strategy.build()?;
        self.gas.validate()?;
        Ok(())
    }

    /// Deterministic BLAKE3 hash of the canonical JSON form.
    ///
    /// Two runs with identical settings share a `ConfigId`.
    pub fn config_id(&self) -> Result<ConfigId, ConfigError> {
        let json = serde_json::to_vec(self)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulselab_core::backtest::EndOfDataPolicy;
    use pulselab_core::strategy::{MeanReversionParams, MomentumParams};

    const FULL: &str = r#"
[backtest]
initial_capital = 25000.0
position_size_pct = 20.0
stop_loss_pct = 3.0
take_profit_pct = 8.0
commission_rate = 0.0005
max_positions = 1
end_of_data = "exclude"

[strategy]
type = "momentum"
rsi_period = 10
oversold = 25
overbought = 75

[optimize.ranges]
rsi_period = [10, 14]
oversold = [25, 30, 35]

[gas]
ema_alpha = 0.4
"#;

    #[test]
    fn parses_all_sections() {
        let cfg = RunConfig::from_toml_str(FULL).unwrap();
        assert_eq!(cfg.backtest.initial_capital, 25_000.0);
        assert_eq!(cfg.backtest.end_of_data, EndOfDataPolicy::Exclude);
        assert_eq!(
            cfg.strategy,
            StrategyConfig::Momentum(MomentumParams {
                rsi_period: 10,
                oversold: 25.0,
                overbought: 75.0,
                ..Default::default()
            })
        );
        assert_eq!(cfg.optimize.ranges.size(), 6);
        assert_eq!(cfg.gas.ema_alpha, 0.4);
        assert_eq!(cfg.gas.trend_window, 12);
        cfg.validate().unwrap();
    }

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = RunConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, RunConfig::default());
        assert_eq!(
            cfg.strategy,
            StrategyConfig::MeanReversion(MeanReversionParams::default())
        );
        assert!(cfg.optimize.ranges.is_empty());
    }

    #[test]
    fn unknown_strategy_type_is_a_parse_error() {
        let err = RunConfig::from_toml_str("[strategy]\ntype = \"martingale\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validate_catches_bad_sections() {
        let cfg = RunConfig::from_toml_str("[backtest]\nposition_size_pct = 0.0\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Params(_))));

        let cfg =
            RunConfig::from_toml_str("[strategy]\ntype = \"momentum\"\nmacd_fast = 40\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Strategy(_))));

        let cfg = RunConfig::from_toml_str("[gas]\nema_alpha = 2.0\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Gas(_))));
    }

    #[test]
    fn config_id_is_deterministic_and_sensitive() {
        let a = RunConfig::from_toml_str(FULL).unwrap();
        let b = RunConfig::from_toml_str(FULL).unwrap();
        assert_eq!(a.config_id().unwrap(), b.config_id().unwrap());
        assert_eq!(a.config_id().unwrap().len(), 64);

        let mut c = a.clone();
        c.backtest.stop_loss_pct = 4.0;
        assert_ne!(a.config_id().unwrap(), c.config_id().unwrap());
    }
}
