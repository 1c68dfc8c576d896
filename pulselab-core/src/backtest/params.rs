//! Strategy parameters supplied to each backtest run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What happens to a position still open when the bars run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfDataPolicy {
    /// Close at the last bar's close with `ExitReason::EndOfData`.
    #[default]
    ForceClose,
    /// Leave it out of the trade list and report it in `BacktestResult::open_position`.
    Exclude,
}

/// Capital and risk settings for one run. Never mutated during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub initial_capital: f64,
    /// Percent of current capital committed per entry, (0, 100].
    pub position_size_pct: f64,
    /// Adverse move from entry, in percent, that triggers an exit.
    pub stop_loss_pct: f64,
    /// Favorable move from entry, in percent, that triggers an exit.
    pub take_profit_pct: f64,
    /// Fraction of traded value charged on entry and on exit.
    pub commission_rate: f64,
    /// Simultaneous positions. The engine holds one position per stream, so
    /// only 1 is accepted.
    pub max_positions: usize,
    pub end_of_data: EndOfDataPolicy,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            position_size_pct: 10.0,
            stop_loss_pct: 5.0,
            take_profit_pct: 10.0,
            commission_rate: 0.001,
            max_positions: 1,
            end_of_data: EndOfDataPolicy::ForceClose,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("{field} must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} out of range: {value} ({expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("max_positions must be 1 (one position per stream), got {0}")]
    MaxPositions(usize),
}

impl StrategyParams {
    /// Reject degenerate settings before any computation runs.
    pub fn validate(&self) -> Result<(), ParamsError> {
        for (field, value) in [
            ("initial_capital", self.initial_capital),
            ("position_size_pct", self.position_size_pct),
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ParamsError::NotPositive { field, value });
            }
        }
        if self.position_size_pct > 100.0 {
            return Err(ParamsError::OutOfRange {
                field: "position_size_pct",
                value: self.position_size_pct,
                expected: "at most 100",
            });
        }
        if !(self.commission_rate.is_finite() && (0.0..1.0).contains(&self.commission_rate)) {
            return Err(ParamsError::OutOfRange {
                field: "commission_rate",
                value: self.commission_rate,
                expected: "0 <= rate < 1",
            });
        }
        if self.max_positions != 1 {
            return Err(ParamsError::MaxPositions(self.max_positions));
        }
        Ok(())
    }
}
