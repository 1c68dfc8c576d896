//! Backtester: replays trading signals against price bars.
//!
//! `Backtester::run` walks the bars once, holding at most one position, and
//! returns every closed trade, the realized capital curve, and aggregate
//! statistics. The sum of trade P&L always equals
//! `final_capital - initial_capital`: a position excluded at the end of data
//! has its entry commission credited back.

pub mod engine;
pub mod metrics;
pub mod params;

pub use engine::{Backtester, CapitalPoint};
pub use metrics::{BacktestStats, ProfitFactor, RISK_FREE_RATE};
pub use params::{EndOfDataPolicy, ParamsError, StrategyParams};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BarError, OpenPosition, Trade};
use crate::strategy::StrategyError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("invalid strategy parameters: {0}")]
    Params(#[from] ParamsError),
    #[error("invalid bar series: {0}")]
    Bars(#[from] BarError),
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    #[error("signal {index} refers to bar {bar_index}, but only {bars} bars were given")]
    SignalOutOfRange {
        index: usize,
        bar_index: usize,
        bars: usize,
    },
    #[error("signal {index} is not after the previous signal's bar")]
    SignalsNotAscending { index: usize },
    #[error("signal {index} has invalid price {price}")]
    InvalidSignalPrice { index: usize, price: f64 },
}

/// Outcome of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub params: StrategyParams,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub stats: BacktestStats,
    pub trades: Vec<Trade>,
    /// Starts with the initial capital; one point per closed trade.
    pub capital_curve: Vec<CapitalPoint>,
    /// Set only under `EndOfDataPolicy::Exclude` when a position was still open.
    pub open_position: Option<OpenPosition>,
    pub signal_count: usize,
    pub bar_count: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BacktestResult {
    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }
}
