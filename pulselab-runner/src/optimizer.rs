//! Exhaustive grid search over strategy and backtest parameters.
//!
//! Every combination in the Cartesian product of the named ranges runs the
//! full signal + backtest pipeline; nothing is pruned. Combinations whose
//! parameters fail validation (e.g. `macd_fast >= macd_slow`,
//! `oversold >= overbought`) or whose indicators need more bars than the
//! series holds are skipped and reported. The winner is the cell
//! with the highest Sharpe ratio; ties go to the earliest cell in grid order.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pulselab_core::backtest::{BacktestError, BacktestResult, Backtester, StrategyParams};
use pulselab_core::domain::{validate_series, Bar, BarError};
use pulselab_core::indicators::IndicatorError;
use pulselab_core::strategy::{StrategyConfig, StrategyError};

use crate::config::RunConfig;

/// One grid cell: parameter name to value.
pub type ParamSet = BTreeMap<String, f64>;

/// Backtest parameters that may appear in a grid.
pub const BACKTEST_PARAMS: [&str; 3] = ["stop_loss_pct", "take_profit_pct", "position_size_pct"];

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("parameter grid is empty")]
    EmptyGrid,
    #[error("range for '{0}' has no values")]
    EmptyRange(String),
    #[error("unknown parameter '{name}' for strategy {strategy}")]
    UnknownParameter {
        name: String,
        strategy: &'static str,
    },
    #[error("parameter '{name}' must be a non-negative whole number, got {value}")]
    NotAnInteger { name: String, value: f64 },
    #[error("invalid bar series: {0}")]
    Bars(#[from] BarError),
    #[error("backtest failed for {params:?}: {source}")]
    Cell {
        params: ParamSet,
        source: BacktestError,
    },
    #[error("no valid parameter combination among {skipped} skipped")]
    NoValidCombination { skipped: usize },
}

/// Named parameter ranges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    ranges: BTreeMap<String, Vec<f64>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a range.
    pub fn with(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.ranges.insert(name.into(), values);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ranges.keys().map(String::as_str)
    }

    /// Number of cells in the Cartesian product.
    pub fn size(&self) -> usize {
        if self.ranges.is_empty() {
            return 0;
        }
        self.ranges.values().map(Vec::len).product()
    }

    /// All cells, in name order with the last name varying fastest.
    pub fn combinations(&self) -> Vec<ParamSet> {
        if self.ranges.is_empty() {
            return Vec::new();
        }
        let mut cells = vec![ParamSet::new()];
        for (name, values) in &self.ranges {
            cells = cells
                .into_iter()
                .flat_map(|cell| {
                    values.iter().map(move |&v| {
                        let mut next = cell.clone();
                        next.insert(name.clone(), v);
                        next
                    })
                })
                .collect();
        }
        cells
    }
}

/// Result of one evaluated grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellResult {
    pub params: ParamSet,
    pub strategy: StrategyConfig,
    pub result: BacktestResult,
}

impl CellResult {
    pub fn sharpe(&self) -> f64 {
        self.result.stats.sharpe_ratio
    }
}

/// A grid cell that failed parameter validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCell {
    pub params: ParamSet,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub best_params: ParamSet,
    pub best_strategy: StrategyConfig,
    pub best_result: BacktestResult,
    /// Every evaluated cell, in grid order.
    pub all_results: Vec<CellResult>,
    pub skipped: Vec<SkippedCell>,
}

impl OptimizationResult {
    pub fn evaluated(&self) -> usize {
        self.all_results.len()
    }

    /// Evaluated cells sorted by Sharpe ratio, best first. Ties keep grid order.
    pub fn leaderboard(&self) -> Vec<&CellResult> {
        let mut ranked: Vec<&CellResult> = self.all_results.iter().collect();
        ranked.sort_by(|a, b| b.sharpe().total_cmp(&a.sharpe()));
        ranked
    }
}

/// Grid-search executor. Parallel by default.
#[derive(Debug, Clone)]
pub struct Optimizer {
    parallel: bool,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self { parallel: true }
    }
}

struct Runnable {
    params: ParamSet,
    strategy: StrategyConfig,
    backtest: StrategyParams,
}

enum Prepared {
    Run(Runnable),
    Skip(SkippedCell),
}

enum Outcome {
    Done(CellResult),
    Skip(SkippedCell),
}

impl Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every cell of `grid` on top of `base` over `bars`.
    pub fn optimize(
        &self,
        base: &RunConfig,
        grid: &ParamGrid,
        bars: &[Bar],
    ) -> Result<OptimizationResult, OptimizeError> {
        if grid.is_empty() {
            return Err(OptimizeError::EmptyGrid);
        }
        for (name, values) in &grid.ranges {
            if values.is_empty() {
                return Err(OptimizeError::EmptyRange(name.clone()));
            }
            check_known(&base.strategy, name)?;
        }
        validate_series(bars)?;

        let mut ready = Vec::with_capacity(grid.size());
        let mut skipped = Vec::new();
        for params in grid.combinations() {
            match prepare(base, params)? {
                Prepared::Run(cell) => ready.push(cell),
                Prepared::Skip(cell) => {
                    tracing::debug!(params = ?cell.params, reason = %cell.reason, "skipping cell");
                    skipped.push(cell);
                }
            }
        }

        tracing::info!(
            cells = grid.size(),
            runnable = ready.len(),
            skipped = skipped.len(),
            parallel = self.parallel,
            "starting grid search"
        );

        let run = |cell: Runnable| run_cell(cell, bars);
        let outcomes: Vec<Outcome> = if self.parallel {
            ready
                .into_par_iter()
                .map(&run)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            ready
                .into_iter()
                .map(&run)
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut all_results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Outcome::Done(cell) => all_results.push(cell),
                Outcome::Skip(cell) => {
                    tracing::debug!(params = ?cell.params, reason = %cell.reason, "skipping cell");
                    skipped.push(cell);
                }
            }
        }

        // strict comparison keeps the earliest cell on ties
        let best = all_results
            .iter()
            .fold(None::<&CellResult>, |best, cell| match best {
                Some(b) if cell.sharpe() <= b.sharpe() => Some(b),
                _ => Some(cell),
            })
            .ok_or(OptimizeError::NoValidCombination {
                skipped: skipped.len(),
            })?;

        tracing::info!(
            evaluated = all_results.len(),
            best_sharpe = best.sharpe(),
            best = ?best.params,
            "grid search finished"
        );

        Ok(OptimizationResult {
            best_params: best.params.clone(),
            best_strategy: best.strategy.clone(),
            best_result: best.result.clone(),
            skipped,
            all_results,
        })
    }
}

/// Run one cell. A cell whose indicators need more bars than the series has
/// is skipped rather than failing the search.
fn run_cell(cell: Runnable, bars: &[Bar]) -> Result<Outcome, OptimizeError> {
    let Runnable {
        params,
        strategy,
        backtest,
    } = cell;
    let outcome = strategy
        .build()
        .map_err(BacktestError::from)
        .and_then(|generator| Backtester::new(backtest)?.run_strategy(bars, generator.as_ref()));
    match outcome {
        Ok(result) => {
            tracing::debug!(?params, sharpe = result.stats.sharpe_ratio, "cell done");
            Ok(Outcome::Done(CellResult {
                params,
                strategy,
                result,
            }))
        }
        Err(BacktestError::Strategy(StrategyError::Indicator(
            e @ IndicatorError::InsufficientData { .. },
        ))) => Ok(Outcome::Skip(SkippedCell {
            params,
            reason: e.to_string(),
        })),
        Err(source) => Err(OptimizeError::Cell { params, source }),
    }
}

fn strategy_param_names(strategy: &StrategyConfig) -> &'static [&'static str] {
    match strategy {
        StrategyConfig::MeanReversion(_) => &["period", "std_dev_multiplier"],
        StrategyConfig::Momentum(_) => &[
            "rsi_period",
            "oversold",
            "overbought",
            "macd_fast",
            "macd_slow",
            "macd_signal",
        ],
    }
}

fn check_known(strategy: &StrategyConfig, name: &str) -> Result<(), OptimizeError> {
    if BACKTEST_PARAMS.contains(&name) || strategy_param_names(strategy).contains(&name) {
        return Ok(());
    }
    Err(OptimizeError::UnknownParameter {
        name: name.to_string(),
        strategy: strategy.name(),
    })
}

fn whole(name: &str, value: f64) -> Result<usize, OptimizeError> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(OptimizeError::NotAnInteger {
            name: name.to_string(),
            value,
        })
    }
}

fn set_strategy_param(
    strategy: &mut StrategyConfig,
    name: &str,
    value: f64,
) -> Result<(), OptimizeError> {
    let strategy_name = strategy.name();
    match strategy {
        StrategyConfig::MeanReversion(p) => match name {
            "period" => p.period = whole(name, value)?,
            "std_dev_multiplier" => p.std_dev_multiplier = value,
            _ => {}
        },
        StrategyConfig::Momentum(p) => match name {
            "rsi_period" => p.rsi_period = whole(name, value)?,
            "oversold" => p.oversold = value,
            "overbought" => p.overbought = value,
            "macd_fast" => p.macd_fast = whole(name, value)?,
            "macd_slow" => p.macd_slow = whole(name, value)?,
            "macd_signal" => p.macd_signal = whole(name, value)?,
            _ => {}
        },
    }
    if strategy_param_names(strategy).contains(&name) {
        Ok(())
    } else {
        Err(OptimizeError::UnknownParameter {
            name: name.to_string(),
            strategy: strategy_name,
        })
    }
}

/// Apply a cell's values to the base configuration and validate the result.
fn prepare(base: &RunConfig, params: ParamSet) -> Result<Prepared, OptimizeError> {
    let mut strategy = base.strategy.clone();
    let mut backtest = base.backtest.clone();
    for (name, &value) in &params {
        match name.as_str() {
            "stop_loss_pct" => backtest.stop_loss_pct = value,
            "take_profit_pct" => backtest.take_profit_pct = value,
            "position_size_pct" => backtest.position_size_pct = value,
            _ => set_strategy_param(&mut strategy, name, value)?,
        }
    }

    let invalid = backtest
        .validate()
        .map_err(|e| e.to_string())
        .and_then(|()| strategy.build().map(|_| ()).map_err(|e| e.to_string()));
    Ok(match invalid {
        Ok(()) => Prepared::Run(Runnable {
            params,
            strategy,
            backtest,
        }),
        Err(reason) => Prepared::Skip(SkippedCell { params, reason }),
    })
}
