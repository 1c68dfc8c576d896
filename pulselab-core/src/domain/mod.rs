//! Domain types for PulseLab

pub mod bar;
pub mod gas;
pub mod signal;
pub mod trade;

pub use bar::{closes, validate_series, Bar, BarError};
pub use gas::{GasDataPoint, GasPrediction, GasTrend, Horizon, HorizonForecasts, Recommendation};
pub use signal::{SignalKind, TradingSignal};
pub use trade::{ExitReason, OpenPosition, PositionSide, Trade};
