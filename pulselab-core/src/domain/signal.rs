//! TradingSignal: a point-in-time buy/sell/hold classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Classification carried by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

impl SignalKind {
    /// The kind that closes a position opened by `self`.
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
            Self::Hold => Self::Hold,
        }
    }

    pub fn is_actionable(self) -> bool {
        !matches!(self, Self::Hold)
    }
}

/// An immutable signal emitted by a signal generator for one bar.
///
/// `indicators` is a snapshot of the named indicator values the generator
/// used to classify the bar (bands, RSI, MACD histogram, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub kind: SignalKind,
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    /// 0 to 100, higher = stronger conviction.
    pub strength: f64,
    /// 0 to 100.
    pub confidence: f64,
    pub indicators: BTreeMap<String, f64>,
}

impl TradingSignal {
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn opposite_kinds() {
        assert_eq!(SignalKind::Buy.opposite(), SignalKind::Sell);
        assert_eq!(SignalKind::Sell.opposite(), SignalKind::Buy);
        assert_eq!(SignalKind::Hold.opposite(), SignalKind::Hold);
        assert!(!SignalKind::Hold.is_actionable());
    }

    #[test]
    fn signal_serialization_roundtrip() {
        let mut indicators = BTreeMap::new();
        indicators.insert("rsi".to_string(), 27.5);
        let signal = TradingSignal {
            kind: SignalKind::Buy,
            bar_index: 31,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            price: 101.25,
            strength: 64.0,
            confidence: 70.0,
            indicators,
        };
        let json = serde_json::to_string(&signal).unwrap();
        assert!(json.contains("\"buy\""));
        let deser: TradingSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(deser, signal);
        assert_eq!(deser.indicator("rsi"), Some(27.5));
    }
}
