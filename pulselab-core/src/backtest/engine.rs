//! Bar-by-bar backtest loop.
//!
//! Two states per run: flat, or holding exactly one position. Per bar:
//! 1. Protective exits: stop-loss / take-profit checked against the close
//! 2. Signal: an opposite signal exits, any actionable signal while flat enters
//!
//! Same-direction signals while in a position are ignored, and a signal that
//! closes a position never reverses it on the same bar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::BacktestStats;
use super::params::{EndOfDataPolicy, StrategyParams};
use super::{BacktestError, BacktestResult};
use crate::domain::{
    validate_series, Bar, ExitReason, OpenPosition, PositionSide, SignalKind, Trade,
    TradingSignal,
};
use crate::strategy::SignalGenerator;

/// Realized capital after a trade closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalPoint {
    pub timestamp: DateTime<Utc>,
    pub capital: f64,
}

#[derive(Debug)]
enum State {
    Flat,
    InPosition(OpenPosition),
}

/// Replays a signal sequence against bars. Holds only the validated parameters,
/// so one instance can be shared across threads.
#[derive(Debug, Clone)]
pub struct Backtester {
    params: StrategyParams,
}

impl Backtester {
    pub fn new(params: StrategyParams) -> Result<Self, BacktestError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// Generate signals with `generator` and replay them.
    pub fn run_strategy(
        &self,
        bars: &[Bar],
        generator: &dyn SignalGenerator,
    ) -> Result<BacktestResult, BacktestError> {
        validate_series(bars)?;
        let signals = generator.generate(bars)?;
        self.run(bars, &signals)
    }

    /// Replay `signals` (ordered by bar index, at most one per bar) over `bars`.
    pub fn run(
        &self,
        bars: &[Bar],
        signals: &[TradingSignal],
    ) -> Result<BacktestResult, BacktestError> {
        validate_series(bars)?;
        check_signals(bars, signals)?;

        let first = &bars[0];
        let last = &bars[bars.len() - 1];
        let mut book = Ledger {
            params: &self.params,
            capital: self.params.initial_capital,
            trades: Vec::new(),
            curve: vec![CapitalPoint {
                timestamp: first.timestamp,
                capital: self.params.initial_capital,
            }],
        };
        let mut state = State::Flat;
        let mut pending = signals.iter().peekable();

        for (i, bar) in bars.iter().enumerate() {
            let signal = pending.next_if(|s| s.bar_index == i);

            // ─── Protective exits ───
            if let State::InPosition(pos) = &state {
                let moved = pos.move_pct(bar.close);
                let reason = if moved <= -self.params.stop_loss_pct {
                    Some(ExitReason::StopLoss)
                } else if moved >= self.params.take_profit_pct {
                    Some(ExitReason::TakeProfit)
                } else {
                    None
                };
                if let Some(reason) = reason {
                    if let State::InPosition(pos) = std::mem::replace(&mut state, State::Flat) {
                        book.close(pos, i, bar.timestamp, bar.close, reason);
                    }
                }
            }

            // ─── Signal ───
            let Some(signal) = signal else { continue };
            let Some(side) = entry_side(signal.kind) else {
                continue;
            };
            state = match state {
                State::InPosition(pos) if pos.side != side => {
                    book.close(pos, i, signal.timestamp, signal.price, ExitReason::Signal);
                    State::Flat
                }
                State::InPosition(pos) => State::InPosition(pos),
                State::Flat => match book.open(side, i, signal.timestamp, signal.price) {
                    Some(pos) => State::InPosition(pos),
                    None => State::Flat,
                },
            };
        }

        // ─── End of data ───
        let open_position = match state {
            State::Flat => None,
            State::InPosition(pos) => match self.params.end_of_data {
                EndOfDataPolicy::ForceClose => {
                    book.close(
                        pos,
                        bars.len() - 1,
                        last.timestamp,
                        last.close,
                        ExitReason::EndOfData,
                    );
                    None
                }
                EndOfDataPolicy::Exclude => {
                    book.release(&pos);
                    Some(pos)
                }
            },
        };

        let span_days = (last.timestamp - first.timestamp).num_seconds() as f64 / 86_400.0;
        let capital: Vec<f64> = book.curve.iter().map(|p| p.capital).collect();
        let stats = BacktestStats::compute(
            &book.trades,
            &capital,
            self.params.initial_capital,
            span_days,
        );

        Ok(BacktestResult {
            params: self.params.clone(),
            initial_capital: self.params.initial_capital,
            final_capital: book.capital,
            stats,
            trades: book.trades,
            capital_curve: book.curve,
            open_position,
            signal_count: signals.len(),
            bar_count: bars.len(),
            start: first.timestamp,
            end: last.timestamp,
        })
    }
}

fn entry_side(kind: SignalKind) -> Option<PositionSide> {
    match kind {
        SignalKind::Buy => Some(PositionSide::Long),
        SignalKind::Sell => Some(PositionSide::Short),
        SignalKind::Hold => None,
    }
}

fn check_signals(bars: &[Bar], signals: &[TradingSignal]) -> Result<(), BacktestError> {
    let mut prev: Option<usize> = None;
    for (i, s) in signals.iter().enumerate() {
        if s.bar_index >= bars.len() {
            return Err(BacktestError::SignalOutOfRange {
                index: i,
                bar_index: s.bar_index,
                bars: bars.len(),
            });
        }
        if prev.is_some_and(|p| s.bar_index <= p) {
            return Err(BacktestError::SignalsNotAscending { index: i });
        }
        if !(s.price.is_finite() && s.price > 0.0) {
            return Err(BacktestError::InvalidSignalPrice {
                index: i,
                price: s.price,
            });
        }
        prev = Some(s.bar_index);
    }
    Ok(())
}

/// Capital, closed trades and the realized curve for one run.
struct Ledger<'a> {
    params: &'a StrategyParams,
    capital: f64,
    trades: Vec<Trade>,
    curve: Vec<CapitalPoint>,
}

impl Ledger<'_> {
    fn open(
        &mut self,
        side: PositionSide,
        bar: usize,
        time: DateTime<Utc>,
        price: f64,
    ) -> Option<OpenPosition> {
        let value = self.capital * self.params.position_size_pct / 100.0;
        if value <= 0.0 {
            tracing::debug!(bar, capital = self.capital, "no capital left to enter");
            return None;
        }
        let commission = value * self.params.commission_rate;
        self.capital -= commission;

        tracing::debug!(bar, ?side, price, value, "open position");
        Some(OpenPosition {
            side,
            entry_bar: bar,
            entry_time: time,
            entry_price: price,
            quantity: value / price,
            entry_commission: commission,
        })
    }

    /// Undo an entry that never becomes a trade. Its entry commission is
    /// credited back by restoring the last realized capital, which is what
    /// capital equals whenever the book is flat.
    fn release(&mut self, pos: &OpenPosition) {
        self.capital = self
            .curve
            .last()
            .map_or(self.params.initial_capital, |p| p.capital);
        tracing::debug!(
            entry_bar = pos.entry_bar,
            refunded = pos.entry_commission,
            "position left open at end of data"
        );
    }

    fn close(
        &mut self,
        pos: OpenPosition,
        bar: usize,
        time: DateTime<Utc>,
        price: f64,
        reason: ExitReason,
    ) {
        let gross = pos.gross_pnl(price);
        let exit_commission = pos.quantity * price * self.params.commission_rate;
        self.capital += gross - exit_commission;

        let pnl = gross - pos.entry_commission - exit_commission;
        let entry_value = pos.entry_value();
        let pnl_pct = if entry_value > 0.0 {
            pnl / entry_value * 100.0
        } else {
            0.0
        };

        tracing::debug!(bar, ?reason, price, pnl, capital = self.capital, "close position");
        self.trades.push(Trade {
            side: pos.side,
            entry_bar: pos.entry_bar,
            entry_time: pos.entry_time,
            entry_price: pos.entry_price,
            exit_bar: bar,
            exit_time: time,
            exit_price: price,
            quantity: pos.quantity,
            gross_pnl: gross,
            commission: pos.entry_commission + exit_commission,
            pnl,
            pnl_pct,
            duration_secs: (time - pos.entry_time).num_seconds(),
            exit_reason: reason,
        });
        self.curve.push(CapitalPoint {
            timestamp: time,
            capital: self.capital,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;
    use std::collections::BTreeMap;

    fn signal(bars: &[Bar], bar_index: usize, kind: SignalKind) -> TradingSignal {
        TradingSignal {
            kind,
            bar_index,
            timestamp: bars[bar_index].timestamp,
            price: bars[bar_index].close,
            strength: 60.0,
            confidence: 70.0,
            indicators: BTreeMap::new(),
        }
    }

    fn no_commission() -> StrategyParams {
        StrategyParams {
            commission_rate: 0.0,
            stop_loss_pct: 50.0,
            take_profit_pct: 50.0,
            ..Default::default()
        }
    }

    fn assert_conserved(r: &BacktestResult) {
        let total: f64 = r.trades.iter().map(|t| t.pnl).sum();
        assert!(
            (total - (r.final_capital - r.initial_capital)).abs() < 1e-6,
            "pnl {total} vs capital change {}",
            r.final_capital - r.initial_capital
        );
    }

    #[test]
    fn long_round_trip_on_signals() {
        let bars = make_bars(&[100.0, 100.0, 110.0, 120.0, 120.0]);
        let signals = vec![
            signal(&bars, 1, SignalKind::Buy),
            signal(&bars, 3, SignalKind::Sell),
        ];
        let r = Backtester::new(no_commission()).unwrap().run(&bars, &signals).unwrap();

        assert_eq!(r.trades.len(), 1);
        let t = &r.trades[0];
        assert_eq!(t.side, PositionSide::Long);
        assert_eq!(t.exit_reason, ExitReason::Signal);
        assert_eq!((t.entry_bar, t.exit_bar), (1, 3));
        // 1000 committed at 100 → 10 units, +20 each
        assert!((t.pnl - 200.0).abs() < 1e-9);
        assert!((t.pnl_pct - 20.0).abs() < 1e-9);
        assert!((r.final_capital - 10_200.0).abs() < 1e-9);
        assert_eq!(t.duration_secs, 2 * 86_400);
        assert!(r.open_position.is_none());
        assert_conserved(&r);
    }

    #[test]
    fn closing_signal_does_not_reverse() {
        let bars = make_bars(&[100.0, 100.0, 110.0, 105.0]);
        let signals = vec![
            signal(&bars, 0, SignalKind::Buy),
            signal(&bars, 2, SignalKind::Sell),
        ];
        let params = StrategyParams {
            end_of_data: EndOfDataPolicy::Exclude,
            ..no_commission()
        };
        let r = Backtester::new(params).unwrap().run(&bars, &signals).unwrap();
        assert_eq!(r.trades.len(), 1);
        assert!(r.open_position.is_none());
    }

    #[test]
    fn short_profits_when_price_falls() {
        let bars = make_bars(&[100.0, 95.0, 90.0, 90.0]);
        let signals = vec![
            signal(&bars, 0, SignalKind::Sell),
            signal(&bars, 2, SignalKind::Buy),
        ];
        let r = Backtester::new(no_commission()).unwrap().run(&bars, &signals).unwrap();
        let t = &r.trades[0];
        assert_eq!(t.side, PositionSide::Short);
        assert!((t.pnl - 100.0).abs() < 1e-9);
        assert_conserved(&r);
    }

    #[test]
    fn same_direction_signal_is_ignored() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0]);
        let signals = vec![
            signal(&bars, 0, SignalKind::Buy),
            signal(&bars, 1, SignalKind::Buy),
            signal(&bars, 3, SignalKind::Sell),
        ];
        let r = Backtester::new(no_commission()).unwrap().run(&bars, &signals).unwrap();
        assert_eq!(r.trades.len(), 1);
        assert_eq!(r.trades[0].entry_bar, 0);
    }

    #[test]
    fn stop_loss_fires_between_signals() {
        let bars = make_bars(&[100.0, 98.0, 94.0, 90.0, 120.0]);
        let signals = vec![
            signal(&bars, 0, SignalKind::Buy),
            signal(&bars, 4, SignalKind::Sell),
        ];
        let params = StrategyParams {
            commission_rate: 0.0,
            ..Default::default()
        };
        let r = Backtester::new(params).unwrap().run(&bars, &signals).unwrap();

        // -6% at bar 2 breaches the 5% stop; the sell at bar 4 then opens a short
        assert_eq!(r.trades[0].exit_reason, ExitReason::StopLoss);
        assert_eq!(r.trades[0].exit_bar, 2);
        assert_eq!(r.trades[0].exit_price, 94.0);
        assert_eq!(r.trades.len(), 2);
        assert_eq!(r.trades[1].side, PositionSide::Short);
        assert_eq!(r.trades[1].exit_reason, ExitReason::EndOfData);
        assert_conserved(&r);
    }

    #[test]
    fn take_profit_fires() {
        let bars = make_bars(&[100.0, 105.0, 111.0, 115.0]);
        let signals = vec![signal(&bars, 0, SignalKind::Buy)];
        let params = StrategyParams {
            commission_rate: 0.0,
            ..Default::default()
        };
        let r = Backtester::new(params).unwrap().run(&bars, &signals).unwrap();
        assert_eq!(r.trades.len(), 1);
        assert_eq!(r.trades[0].exit_reason, ExitReason::TakeProfit);
        assert_eq!(r.trades[0].exit_bar, 2);
    }

    #[test]
    fn commissions_are_charged_both_ways() {
        let bars = make_bars(&[100.0, 100.0, 100.0]);
        let signals = vec![
            signal(&bars, 0, SignalKind::Buy),
            signal(&bars, 2, SignalKind::Sell),
        ];
        let params = StrategyParams {
            commission_rate: 0.01,
            ..Default::default()
        };
        let r = Backtester::new(params).unwrap().run(&bars, &signals).unwrap();
        let t = &r.trades[0];
        // 1000 in, 1000 out, 1% each way
        assert!((t.commission - 20.0).abs() < 1e-9);
        assert!((t.pnl + 20.0).abs() < 1e-9);
        assert!((r.final_capital - 9_980.0).abs() < 1e-9);
        assert_conserved(&r);
    }

    #[test]
    fn force_close_at_end_of_data() {
        let bars = make_bars(&[100.0, 102.0, 104.0]);
        let signals = vec![signal(&bars, 0, SignalKind::Buy)];
        let r = Backtester::new(no_commission()).unwrap().run(&bars, &signals).unwrap();
        assert_eq!(r.trades.len(), 1);
        assert_eq!(r.trades[0].exit_reason, ExitReason::EndOfData);
        assert_eq!(r.trades[0].exit_price, 104.0);
        assert!(r.open_position.is_none());
        assert_conserved(&r);
    }

    #[test]
    fn exclude_reports_open_position() {
        let bars = make_bars(&[100.0, 102.0, 104.0]);
        let signals = vec![signal(&bars, 0, SignalKind::Buy)];
        let params = StrategyParams {
            end_of_data: EndOfDataPolicy::Exclude,
            ..no_commission()
        };
        let r = Backtester::new(params).unwrap().run(&bars, &signals).unwrap();
        assert!(r.trades.is_empty());
        let pos = r.open_position.as_ref().unwrap();
        assert_eq!(pos.entry_bar, 0);
        assert_eq!(r.stats.total_trades, 0);
    }

    #[test]
    fn excluded_position_leaves_capital_untouched() {
        let bars = make_bars(&[100.0, 102.0, 104.0]);
        let signals = vec![signal(&bars, 0, SignalKind::Buy)];
        let params = StrategyParams {
            end_of_data: EndOfDataPolicy::Exclude,
            commission_rate: 0.01,
            position_size_pct: 10.0,
            ..no_commission()
        };
        let r = Backtester::new(params).unwrap().run(&bars, &signals).unwrap();
        let pos = r.open_position.as_ref().unwrap();
        assert!((pos.entry_commission - 10.0).abs() < 1e-9);
        assert_eq!(r.final_capital, r.initial_capital);
        assert_eq!(r.stats.total_return_pct, 0.0);
        assert_eq!(r.capital_curve.last().unwrap().capital, r.final_capital);
        assert_conserved(&r);
    }

    #[test]
    fn exclude_after_closed_trade_conserves() {
        let bars = make_bars(&[100.0, 110.0, 110.0, 100.0, 95.0]);
        let signals = vec![
            signal(&bars, 0, SignalKind::Buy),
            signal(&bars, 1, SignalKind::Sell),
            signal(&bars, 3, SignalKind::Buy),
        ];
        let params = StrategyParams {
            end_of_data: EndOfDataPolicy::Exclude,
            commission_rate: 0.002,
            ..no_commission()
        };
        let r = Backtester::new(params).unwrap().run(&bars, &signals).unwrap();
        assert_eq!(r.trades.len(), 1);
        assert_eq!(r.open_position.as_ref().unwrap().entry_bar, 3);
        assert_eq!(r.capital_curve.last().unwrap().capital, r.final_capital);
        assert_conserved(&r);
    }

    #[test]
    fn no_signals_no_trades() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let r = Backtester::new(no_commission()).unwrap().run(&bars, &[]).unwrap();
        assert!(r.trades.is_empty());
        assert_eq!(r.final_capital, r.initial_capital);
        assert_eq!(r.capital_curve.len(), 1);
        assert_eq!(r.stats.sharpe_ratio, 0.0);
    }

    #[test]
    fn hold_signals_do_nothing() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let signals = vec![signal(&bars, 1, SignalKind::Hold)];
        let r = Backtester::new(no_commission()).unwrap().run(&bars, &signals).unwrap();
        assert!(r.trades.is_empty());
    }

    #[test]
    fn rejects_bad_signal_sequences() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let bt = Backtester::new(no_commission()).unwrap();

        let mut out_of_range = signal(&bars, 2, SignalKind::Buy);
        out_of_range.bar_index = 7;
        assert!(matches!(
            bt.run(&bars, &[out_of_range]),
            Err(BacktestError::SignalOutOfRange { bar_index: 7, .. })
        ));

        let unordered = vec![
            signal(&bars, 2, SignalKind::Buy),
            signal(&bars, 1, SignalKind::Sell),
        ];
        assert!(matches!(
            bt.run(&bars, &unordered),
            Err(BacktestError::SignalsNotAscending { index: 1 })
        ));
    }

    #[test]
    fn rejects_empty_bars_and_bad_params() {
        let bt = Backtester::new(no_commission()).unwrap();
        assert!(matches!(bt.run(&[], &[]), Err(BacktestError::Bars(_))));

        let params = StrategyParams {
            initial_capital: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            Backtester::new(params),
            Err(BacktestError::Params(_))
        ));
    }

    #[test]
    fn capital_curve_tracks_each_exit() {
        let bars = make_bars(&[100.0, 110.0, 100.0, 90.0, 95.0]);
        let signals = vec![
            signal(&bars, 0, SignalKind::Buy),
            signal(&bars, 1, SignalKind::Sell),
            signal(&bars, 2, SignalKind::Sell),
            signal(&bars, 4, SignalKind::Buy),
        ];
        let r = Backtester::new(no_commission()).unwrap().run(&bars, &signals).unwrap();
        assert_eq!(r.trades.len(), 2);
        assert_eq!(r.capital_curve.len(), 3);
        assert_eq!(r.capital_curve.last().unwrap().capital, r.final_capital);
        assert_conserved(&r);
    }
}
