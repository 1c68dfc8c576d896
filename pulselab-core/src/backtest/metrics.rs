//! Backtest statistics: pure functions over the trade list and capital curve.

use serde::{Deserialize, Serialize};

use crate::domain::Trade;

/// Annual risk-free rate used by the Sharpe ratio.
pub const RISK_FREE_RATE: f64 = 0.02;

const DAYS_PER_YEAR: f64 = 365.25;

/// Gross profit over gross loss, with the no-loss case made explicit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfitFactor {
    Finite(f64),
    /// Profitable trades and no losing trades.
    Infinite,
}

impl ProfitFactor {
    pub fn value(self) -> f64 {
        match self {
            Self::Finite(v) => v,
            Self::Infinite => f64::INFINITY,
        }
    }

    pub fn is_infinite(self) -> bool {
        matches!(self, Self::Infinite)
    }
}

/// Aggregate statistics for one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of trades with positive net P&L.
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub total_pnl: f64,
    pub total_commission: f64,
    pub profit_factor: ProfitFactor,
    /// Mean net P&L per trade.
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough decline of realized capital, in percent.
    pub max_drawdown_pct: f64,
    pub max_drawdown_abs: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_trade_duration_days: f64,
}

impl BacktestStats {
    /// Compute all statistics.
    ///
    /// `capital_curve` is realized capital, starting with the initial capital
    /// and appended after every closed trade. `span_days` is the calendar span
    /// of the input bars.
    pub fn compute(trades: &[Trade], capital_curve: &[f64], initial: f64, span_days: f64) -> Self {
        let final_capital = capital_curve.last().copied().unwrap_or(initial);
        let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
        let losses: Vec<f64> = trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl).collect();
        let (dd_pct, dd_abs) = max_drawdown(capital_curve);

        Self {
            total_trades: trades.len(),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: win_rate(trades),
            gross_profit: wins.iter().sum(),
            gross_loss: losses.iter().map(|l| l.abs()).sum(),
            total_pnl: trades.iter().map(|t| t.pnl).sum(),
            total_commission: trades.iter().map(|t| t.commission).sum(),
            profit_factor: profit_factor(trades),
            expectancy: mean_f64(&trades.iter().map(|t| t.pnl).collect::<Vec<_>>()),
            avg_win: mean_f64(&wins),
            avg_loss: mean_f64(&losses).abs(),
            largest_win: wins.iter().copied().fold(0.0, f64::max),
            largest_loss: losses.iter().copied().fold(0.0, f64::min).abs(),
            total_return_pct: total_return(initial, final_capital) * 100.0,
            annualized_return_pct: annualized_return(initial, final_capital, span_days) * 100.0,
            sharpe_ratio: sharpe_ratio(trades),
            max_drawdown_pct: dd_pct * 100.0,
            max_drawdown_abs: dd_abs,
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_trade_duration_days: avg_duration_days(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(initial: f64, final_capital: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    (final_capital - initial) / initial
}

/// Total return compounded to a yearly rate over `span_days` calendar days.
///
/// Spans shorter than one day report the plain total return; a wiped-out
/// account reports -1.
pub fn annualized_return(initial: f64, final_capital: f64, span_days: f64) -> f64 {
    let total = total_return(initial, final_capital);
    if span_days < 1.0 {
        return total;
    }
    if final_capital <= 0.0 {
        return -1.0;
    }
    let years = span_days / DAYS_PER_YEAR;
    (1.0 + total).powf(1.0 / years) - 1.0
}

/// Per-trade Sharpe ratio.
///
/// (mean trade return - risk-free) / stddev(trade returns), where the 2%
/// annual risk-free rate is pro-rated to the average holding period.
/// Returns 0.0 with fewer than two trades or zero variance.
pub fn sharpe_ratio(trades: &[Trade]) -> f64 {
    if trades.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = trades.iter().map(|t| t.return_fraction()).collect();
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    let rf = RISK_FREE_RATE * avg_duration_days(trades) / DAYS_PER_YEAR;
    (mean_f64(&returns) - rf) / std
}

/// Maximum drawdown of a capital curve as (fraction, absolute amount).
///
/// Both are non-negative; (0, 0) for constant or rising curves.
pub fn max_drawdown(capital_curve: &[f64]) -> (f64, f64) {
    let Some(&first) = capital_curve.first() else {
        return (0.0, 0.0);
    };
    let mut peak = first;
    let mut max_frac = 0.0_f64;
    let mut max_abs = 0.0_f64;

    for &c in capital_curve {
        if c > peak {
            peak = c;
        }
        let drop = peak - c;
        max_abs = max_abs.max(drop);
        if peak > 0.0 {
            max_frac = max_frac.max(drop / peak);
        }
    }
    (max_frac, max_abs)
}

/// Win rate in percent.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

/// Gross profit / gross loss. `Infinite` when there are profits and no losses.
pub fn profit_factor(trades: &[Trade]) -> ProfitFactor {
    let gross_profit: f64 = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.is_loser())
        .map(|t| t.pnl.abs())
        .sum();

    if gross_loss == 0.0 {
        return if gross_profit > 0.0 {
            ProfitFactor::Infinite
        } else {
            ProfitFactor::Finite(0.0)
        };
    }
    ProfitFactor::Finite(gross_profit / gross_loss)
}

pub fn avg_duration_days(trades: &[Trade]) -> f64 {
    mean_f64(&trades.iter().map(|t| t.duration_days()).collect::<Vec<_>>())
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[Trade], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;

    for trade in trades {
        let hit = if winners {
            trade.is_winner()
        } else {
            trade.is_loser()
        };
        if hit {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}
