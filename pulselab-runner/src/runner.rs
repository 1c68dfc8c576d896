//! Backtest runner: wires configuration, data, strategy and backtester.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads bars from CSV, then runs. Used by the CLI.
//! - `run_backtest_from_data()`: takes pre-loaded bars, no I/O.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pulselab_core::backtest::{BacktestError, BacktestResult, Backtester};
use pulselab_core::domain::Bar;
use pulselab_core::strategy::{StrategyConfig, StrategyError};

use crate::config::{ConfigError, ConfigId, RunConfig};
use crate::data_loader::{dataset_hash, load_bars_csv, LoadError};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
    #[error("backtest error: {0}")]
    Backtest(#[from] BacktestError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// A backtest result together with what produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config_id: ConfigId,
    pub strategy: StrategyConfig,
    pub dataset_hash: String,
    pub result: BacktestResult,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load bars from `bars_path` and run `config` over them.
pub fn run_single_backtest(config: &RunConfig, bars_path: &Path) -> Result<RunReport, RunError> {
    let bars = load_bars_csv(bars_path)?;
    run_backtest_from_data(config, &bars)
}

/// Run `config` over pre-loaded bars.
pub fn run_backtest_from_data(config: &RunConfig, bars: &[Bar]) -> Result<RunReport, RunError> {
    config.validate()?;
    let generator = config.strategy.build()?;
    let backtester = Backtester::new(config.backtest.clone())?;
    let result = backtester.run_strategy(bars, generator.as_ref())?;

    tracing::info!(
        strategy = config.strategy.name(),
        bars = result.bar_count,
        signals = result.signal_count,
        trades = result.stats.total_trades,
        total_return_pct = result.stats.total_return_pct,
        sharpe = result.stats.sharpe_ratio,
        "backtest complete"
    );

    Ok(RunReport {
        schema_version: SCHEMA_VERSION,
        config_id: config.config_id()?,
        strategy: config.strategy.clone(),
        dataset_hash: dataset_hash(bars),
        result,
    })
}
