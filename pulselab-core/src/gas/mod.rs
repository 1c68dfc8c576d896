//! Gas fee forecaster.
//!
//! Smooths total gas with an EMA, classifies the recent trend, and blends the
//! current value toward the EMA to produce point forecasts for each horizon.
//! A confidence score and a send/wait recommendation are derived from the
//! forecasts. Each call is independent; the forecaster keeps no state between
//! calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    GasDataPoint, GasPrediction, GasTrend, Horizon, HorizonForecasts, Recommendation,
};
use crate::indicators::{ema_alpha, IndicatorError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GasError {
    #[error("gas forecast needs at least {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("gas point {index} has non-finite or out-of-range values")]
    InvalidPoint { index: usize },
    #[error("gas point {index} timestamp is not after the previous point")]
    NotAscending { index: usize },
    #[error("invalid gas forecast config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Indicator(#[from] IndicatorError),
}

/// Tunable constants for the forecaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasForecastConfig {
    /// EMA smoothing factor, (0, 1].
    pub ema_alpha: f64,
    /// Most recent points split in halves for trend detection.
    pub trend_window: usize,
    /// Half-over-half change beyond which the trend is rising or falling.
    pub trend_threshold: f64,
    /// Rising change beyond which the recommendation becomes urgent.
    pub surge_threshold: f64,
    /// Fraction of the gap to the EMA closed per sampling interval.
    pub mean_reversion: f64,
    /// Minutes between observations, used to convert horizons to steps.
    pub interval_minutes: f64,
    pub min_points: usize,
    /// Savings (percent) needed to wait on a falling trend.
    pub wait_savings_pct: f64,
    /// Confidence needed to wait on a falling trend.
    pub wait_confidence: f64,
    /// Savings (percent) that justify waiting regardless of trend.
    pub strong_savings_pct: f64,
}

impl Default for GasForecastConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.3,
            trend_window: 12,
            trend_threshold: 0.10,
            surge_threshold: 0.25,
            mean_reversion: 0.3,
            interval_minutes: 5.0,
            min_points: 10,
            wait_savings_pct: 15.0,
            wait_confidence: 70.0,
            strong_savings_pct: 25.0,
        }
    }
}

impl GasForecastConfig {
    pub fn validate(&self) -> Result<(), GasError> {
        let invalid = |msg: String| -> Result<(), GasError> { Err(GasError::InvalidConfig(msg)) };
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return invalid(format!("ema_alpha must be in (0, 1], got {}", self.ema_alpha));
        }
        if !(0.0..=1.0).contains(&self.mean_reversion) {
            return invalid(format!(
                "mean_reversion must be in [0, 1], got {}",
                self.mean_reversion
            ));
        }
        if self.trend_window < 2 {
            return invalid("trend_window must be >= 2".into());
        }
        if self.min_points == 0 {
            return invalid("min_points must be >= 1".into());
        }
        if !(self.interval_minutes.is_finite() && self.interval_minutes > 0.0) {
            return invalid(format!(
                "interval_minutes must be positive, got {}",
                self.interval_minutes
            ));
        }
        if !(self.trend_threshold >= 0.0 && self.surge_threshold >= self.trend_threshold) {
            return invalid("thresholds must satisfy 0 <= trend <= surge".into());
        }
        Ok(())
    }
}

/// Caller-constructed gas forecaster.
#[derive(Debug, Clone, Default)]
pub struct GasForecaster {
    config: GasForecastConfig,
}

impl GasForecaster {
    pub fn new(config: GasForecastConfig) -> Result<Self, GasError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GasForecastConfig {
        &self.config
    }

    /// Forecast using the system clock for staleness.
    pub fn forecast_now(&self, points: &[GasDataPoint]) -> Result<GasPrediction, GasError> {
        self.forecast(points, Utc::now())
    }

    /// Forecast from an ordered series, judging staleness against `now`.
    pub fn forecast(
        &self,
        points: &[GasDataPoint],
        now: DateTime<Utc>,
    ) -> Result<GasPrediction, GasError> {
        let cfg = &self.config;
        check_points(points, cfg.min_points)?;

        let totals: Vec<f64> = points.iter().map(|p| p.total_gas).collect();
        let smoothed = ema_alpha(&totals, cfg.ema_alpha)?;
        let current = totals[totals.len() - 1];
        let ema = smoothed.last().unwrap_or(current);

        let (trend, trend_change) = detect_trend(&totals, cfg.trend_window, cfg.trend_threshold);
        let volatility = coefficient_of_variation(&totals);

        let forecast = |h: Horizon| self.project(current, ema, trend, h);
        let predictions = HorizonForecasts {
            five_minutes: forecast(Horizon::FiveMinutes),
            fifteen_minutes: forecast(Horizon::FifteenMinutes),
            one_hour: forecast(Horizon::OneHour),
            four_hours: forecast(Horizon::FourHours),
        };

        let age_minutes = (now - points[points.len() - 1].timestamp).num_seconds() as f64 / 60.0;
        let confidence = confidence(volatility, points.len(), age_minutes);

        let (best_horizon, best) = predictions.best();
        let expected_savings_pct = if current > 0.0 {
            ((current - best) / current * 100.0).max(0.0)
        } else {
            0.0
        };

        let recommendation = match trend {
            GasTrend::Rising if trend_change > cfg.surge_threshold => Recommendation::Urgent,
            GasTrend::Rising => Recommendation::SendNow,
            _ => {
                let falling_wait = trend == GasTrend::Falling
                    && expected_savings_pct > cfg.wait_savings_pct
                    && confidence > cfg.wait_confidence;
                if falling_wait || expected_savings_pct > cfg.strong_savings_pct {
                    Recommendation::Wait
                } else {
                    Recommendation::SendNow
                }
            }
        };

        tracing::debug!(
            points = points.len(),
            current,
            ema,
            ?trend,
            confidence,
            ?recommendation,
            "gas forecast"
        );

        Ok(GasPrediction {
            current,
            ema,
            predictions,
            confidence,
            trend,
            trend_change,
            volatility,
            recommendation,
            best_horizon,
            expected_savings_pct,
        })
    }

    /// Close `1 - (1 - r)^k` of the gap to the EMA over k intervals, then tilt
    /// by the trend multiplier scaled to the horizon length.
    fn project(&self, current: f64, ema: f64, trend: GasTrend, horizon: Horizon) -> f64 {
        let steps = (f64::from(horizon.minutes()) / self.config.interval_minutes).max(1.0);
        let weight = 1.0 - (1.0 - self.config.mean_reversion).powf(steps);
        let blended = current + weight * (ema - current);
        let tilt = 1.0 + (trend.multiplier() - 1.0) * horizon_scale(horizon);
        (blended * tilt).max(0.0)
    }
}

fn horizon_scale(horizon: Horizon) -> f64 {
    match horizon {
        Horizon::FiveMinutes => 0.25,
        Horizon::FifteenMinutes => 0.5,
        Horizon::OneHour => 1.0,
        Horizon::FourHours => 1.5,
    }
}

fn check_points(points: &[GasDataPoint], min_points: usize) -> Result<(), GasError> {
    if points.len() < min_points {
        return Err(GasError::InsufficientData {
            required: min_points,
            actual: points.len(),
        });
    }
    for (index, p) in points.iter().enumerate() {
        if !p.is_valid() {
            return Err(GasError::InvalidPoint { index });
        }
        if index > 0 && p.timestamp <= points[index - 1].timestamp {
            return Err(GasError::NotAscending { index });
        }
    }
    Ok(())
}

/// Compare the mean of the newer half of the window with the older half.
fn detect_trend(values: &[f64], window: usize, threshold: f64) -> (GasTrend, f64) {
    let recent = &values[values.len().saturating_sub(window)..];
    let half = recent.len() / 2;
    if half == 0 {
        return (GasTrend::Stable, 0.0);
    }
    let older = mean(&recent[..half]);
    let newer = mean(&recent[half..]);
    if older <= 0.0 {
        return (GasTrend::Stable, 0.0);
    }
    let change = (newer - older) / older;
    let trend = if change > threshold {
        GasTrend::Rising
    } else if change < -threshold {
        GasTrend::Falling
    } else {
        GasTrend::Stable
    };
    (trend, change)
}

/// Population standard deviation over mean; 0 for a non-positive mean.
fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if m <= 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / m
}

/// Start at 100 and subtract for volatility, sparse data and staleness.
fn confidence(volatility: f64, n: usize, age_minutes: f64) -> f64 {
    let mut score: f64 = 100.0;
    if volatility > 0.5 {
        score -= 30.0;
    } else if volatility > 0.25 {
        score -= 15.0;
    }
    if n < 20 {
        score -= 20.0;
    } else if n < 50 {
        score -= 10.0;
    }
    if age_minutes > 30.0 {
        score -= 25.0;
    } else if age_minutes > 10.0 {
        score -= 10.0;
    }
    score.max(50.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
