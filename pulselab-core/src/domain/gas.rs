//! Gas fee observations and forecasts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One gas fee observation, in gwei.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasDataPoint {
    pub timestamp: DateTime<Utc>,
    pub base_fee: f64,
    pub priority_fee: f64,
    pub total_gas: f64,
    pub block_number: u64,
    pub pending_tx_count: u64,
    /// Fraction of the block gas limit used, 0 to 1.
    pub block_utilization: f64,
}

impl GasDataPoint {
    pub fn is_valid(&self) -> bool {
        self.base_fee.is_finite()
            && self.priority_fee.is_finite()
            && self.total_gas.is_finite()
            && self.total_gas >= 0.0
            && (0.0..=1.0).contains(&self.block_utilization)
    }
}

/// Direction of recent gas fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasTrend {
    Rising,
    Falling,
    Stable,
}

impl GasTrend {
    /// Forecast multiplier applied for this trend.
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Rising => 1.05,
            Self::Falling => 0.95,
            Self::Stable => 1.0,
        }
    }
}

/// Timing advice for submitting a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    SendNow,
    Wait,
    Urgent,
}

/// Forward horizons forecast by the gas forecaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    FourHours,
}

impl Horizon {
    pub const ALL: [Horizon; 4] = [
        Horizon::FiveMinutes,
        Horizon::FifteenMinutes,
        Horizon::OneHour,
        Horizon::FourHours,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            Self::FiveMinutes => 5,
            Self::FifteenMinutes => 15,
            Self::OneHour => 60,
            Self::FourHours => 240,
        }
    }
}

/// Point forecasts for each horizon, in gwei.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonForecasts {
    pub five_minutes: f64,
    pub fifteen_minutes: f64,
    pub one_hour: f64,
    pub four_hours: f64,
}

impl HorizonForecasts {
    pub fn get(&self, horizon: Horizon) -> f64 {
        match horizon {
            Horizon::FiveMinutes => self.five_minutes,
            Horizon::FifteenMinutes => self.fifteen_minutes,
            Horizon::OneHour => self.one_hour,
            Horizon::FourHours => self.four_hours,
        }
    }

    /// Horizon with the lowest forecast. Earlier horizons win ties.
    pub fn best(&self) -> (Horizon, f64) {
        Horizon::ALL
            .iter()
            .map(|&h| (h, self.get(h)))
            .fold((Horizon::FiveMinutes, f64::INFINITY), |best, cur| {
                if cur.1 < best.1 {
                    cur
                } else {
                    best
                }
            })
    }
}

/// Result of one gas forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasPrediction {
    pub current: f64,
    pub ema: f64,
    pub predictions: HorizonForecasts,
    /// 50 to 100.
    pub confidence: f64,
    pub trend: GasTrend,
    /// Relative change between the two halves of the trend window.
    pub trend_change: f64,
    /// Coefficient of variation of the series.
    pub volatility: f64,
    pub recommendation: Recommendation,
    pub best_horizon: Horizon,
    /// Savings of the best forecast versus the current price, in percent.
    pub expected_savings_pct: f64,
}
