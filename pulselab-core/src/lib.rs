//! PulseLab Core: indicators, signal generation, backtesting, gas forecasting.
//!
//! This crate is pure computation over in-memory series:
//! - Domain types (bars, signals, positions, trades, gas observations)
//! - Technical indicator library with index-aligned output
//! - Mean-reversion and momentum signal generators
//! - Single-position backtester with statistics
//! - Gas fee forecaster
//!
//! Nothing here performs I/O or holds global state; every engine is a
//! caller-constructed value.

pub mod backtest;
pub mod domain;
pub mod gas;
pub mod indicators;
pub mod strategy;
