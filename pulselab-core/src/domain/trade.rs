//! Open positions and closed trades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    EndOfData,
}

/// A position held by the backtester between entry and exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub side: PositionSide,
    pub entry_bar: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub quantity: f64,
    /// Commission already deducted from capital at entry.
    pub entry_commission: f64,
}

impl OpenPosition {
    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.quantity
    }

    /// Signed price move relative to entry, in percent. Positive = favorable.
    pub fn move_pct(&self, price: f64) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        self.side.sign() * (price - self.entry_price) / self.entry_price * 100.0
    }

    /// Price P&L before exit commission if closed at `price`.
    pub fn gross_pnl(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price) * self.quantity
    }
}

/// A closed round-trip trade.
///
/// `pnl` is net of both entry and exit commissions, so the sum of `pnl`
/// over all trades equals the realized change in capital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: PositionSide,
    pub entry_bar: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_bar: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub quantity: f64,
    pub gross_pnl: f64,
    pub commission: f64,
    pub pnl: f64,
    /// Net P&L as a percentage of the entry value.
    pub pnl_pct: f64,
    pub duration_secs: i64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }

    /// Net return as a fraction of entry value.
    pub fn return_fraction(&self) -> f64 {
        self.pnl_pct / 100.0
    }

    pub fn duration_days(&self) -> f64 {
        self.duration_secs as f64 / 86_400.0
    }
}
