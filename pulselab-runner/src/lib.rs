//! PulseLab Runner: configuration, data loading, optimization, export.
//!
//! This crate builds on `pulselab-core` to provide:
//! - TOML run configuration with content-hash IDs
//! - CSV loading for price bars and gas observations
//! - Single-backtest runner producing versioned reports
//! - Exhaustive grid-search optimizer (parallel via rayon)
//! - JSON/CSV artifact export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod optimizer;
pub mod runner;

pub use config::{ConfigError, ConfigId, OptimizeConfig, RunConfig};
pub use data_loader::{
    dataset_hash, load_bars_csv, load_gas_csv, parse_timestamp, read_bars, read_gas_points,
    LoadError,
};
pub use optimizer::{
    CellResult, OptimizationResult, OptimizeError, Optimizer, ParamGrid, ParamSet, SkippedCell,
};
pub use runner::{run_backtest_from_data, run_single_backtest, RunError, RunReport, SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<ParamGrid>();
        assert_sync::<ParamGrid>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<RunReport>();
        assert_sync::<RunReport>();
        assert_send::<OptimizationResult>();
        assert_sync::<OptimizationResult>();
        assert_send::<Optimizer>();
        assert_sync::<Optimizer>();
    }
}
