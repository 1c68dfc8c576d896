//! Integration tests for the grid-search optimizer.

use chrono::{Duration, TimeZone, Utc};

use pulselab_core::backtest::{Backtester, StrategyParams};
use pulselab_core::domain::Bar;
use pulselab_core::strategy::{MeanReversionParams, MomentumParams, StrategyConfig};
use pulselab_runner::{OptimizeError, Optimizer, ParamGrid, RunConfig};

fn fixture_bars(n: usize) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + 8.0 * (x / 7.0).sin() + 3.0 * (x / 2.3).cos() + 0.02 * x;
            Bar {
                timestamp: base + Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 50_000.0,
            }
        })
        .collect()
}

fn base_config() -> RunConfig {
    RunConfig {
        backtest: StrategyParams {
            stop_loss_pct: 8.0,
            take_profit_pct: 12.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn grid_2x3() -> ParamGrid {
    ParamGrid::new()
        .with("period", vec![10.0, 20.0])
        .with("std_dev_multiplier", vec![1.0, 1.5, 2.0])
}

#[test]
fn evaluates_every_cell_and_picks_max_sharpe() {
    let bars = fixture_bars(250);
    let base = base_config();
    let result = Optimizer::new().optimize(&base, &grid_2x3(), &bars).unwrap();

    assert_eq!(result.evaluated(), 6);
    assert!(result.skipped.is_empty());

    // recompute every cell directly and find the strict maximum
    let mut expected_best: Option<(f64, usize, f64)> = None;
    for period in [10usize, 20] {
        for mult in [1.0, 1.5, 2.0] {
            let generator = StrategyConfig::MeanReversion(MeanReversionParams {
                period,
                std_dev_multiplier: mult,
            })
            .build()
            .unwrap();
            let direct = Backtester::new(base.backtest.clone())
                .unwrap()
                .run_strategy(&bars, generator.as_ref())
                .unwrap();
            let sharpe = direct.stats.sharpe_ratio;
            if expected_best.map_or(true, |(s, _, _)| sharpe > s) {
                expected_best = Some((sharpe, period, mult));
            }
        }
    }
    let (sharpe, period, mult) = expected_best.unwrap();

    assert_eq!(result.best_params["period"], period as f64);
    assert_eq!(result.best_params["std_dev_multiplier"], mult);
    assert_eq!(result.best_result.stats.sharpe_ratio, sharpe);
    assert!(result
        .all_results
        .iter()
        .all(|c| c.sharpe() <= result.best_result.stats.sharpe_ratio));
}

#[test]
fn results_come_back_in_grid_order() {
    let bars = fixture_bars(200);
    let result = Optimizer::new()
        .optimize(&base_config(), &grid_2x3(), &bars)
        .unwrap();
    let order: Vec<(f64, f64)> = result
        .all_results
        .iter()
        .map(|c| (c.params["period"], c.params["std_dev_multiplier"]))
        .collect();
    assert_eq!(
        order,
        vec![
            (10.0, 1.0),
            (10.0, 1.5),
            (10.0, 2.0),
            (20.0, 1.0),
            (20.0, 1.5),
            (20.0, 2.0)
        ]
    );
}

#[test]
fn parallel_and_sequential_agree() {
    let bars = fixture_bars(200);
    let base = base_config();
    let par = Optimizer::new().optimize(&base, &grid_2x3(), &bars).unwrap();
    let seq = Optimizer::new()
        .with_parallelism(false)
        .optimize(&base, &grid_2x3(), &bars)
        .unwrap();
    assert_eq!(par.all_results, seq.all_results);
    assert_eq!(par.best_params, seq.best_params);
}

#[test]
fn sharpe_ties_resolve_to_first_cell() {
    // a flat series never leaves the bands: every cell has Sharpe 0
    let bars: Vec<Bar> = fixture_bars(60)
        .into_iter()
        .map(|b| Bar {
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            ..b
        })
        .collect();
    let grid = ParamGrid::new().with("position_size_pct", vec![5.0, 10.0, 20.0]);
    let result = Optimizer::new().optimize(&base_config(), &grid, &bars).unwrap();
    assert_eq!(result.evaluated(), 3);
    assert!(result.all_results.iter().all(|c| c.sharpe() == 0.0));
    assert_eq!(result.best_params["position_size_pct"], 5.0);
}

#[test]
fn invalid_combinations_are_skipped_and_counted() {
    let bars = fixture_bars(200);
    let base = RunConfig {
        strategy: StrategyConfig::Momentum(MomentumParams::default()),
        ..base_config()
    };
    let grid = ParamGrid::new()
        .with("oversold", vec![25.0, 30.0, 75.0])
        .with("overbought", vec![70.0, 80.0]);
    let result = Optimizer::new().optimize(&base, &grid, &bars).unwrap();
    // 75 >= 70 is invalid; 75 < 80 is fine
    assert_eq!(result.evaluated(), 5);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].params["oversold"], 75.0);
    assert_eq!(result.skipped[0].params["overbought"], 70.0);
    assert!(result.skipped[0].reason.contains("oversold"));
}

#[test]
fn leaderboard_is_sorted_by_sharpe() {
    let bars = fixture_bars(250);
    let result = Optimizer::new()
        .optimize(&base_config(), &grid_2x3(), &bars)
        .unwrap();
    let board = result.leaderboard();
    assert_eq!(board.len(), 6);
    assert!(board.windows(2).all(|w| w[0].sharpe() >= w[1].sharpe()));
    assert_eq!(board[0].params, result.best_params);
}

#[test]
fn rejects_unknown_and_empty_ranges() {
    let bars = fixture_bars(100);
    let base = base_config();

    let unknown = ParamGrid::new().with("rsi_period", vec![14.0]);
    assert!(matches!(
        Optimizer::new().optimize(&base, &unknown, &bars),
        Err(OptimizeError::UnknownParameter { .. })
    ));

    let empty = ParamGrid::new().with("period", vec![]);
    assert!(matches!(
        Optimizer::new().optimize(&base, &empty, &bars),
        Err(OptimizeError::EmptyRange(_))
    ));

    assert!(matches!(
        Optimizer::new().optimize(&base, &ParamGrid::new(), &bars),
        Err(OptimizeError::EmptyGrid)
    ));
}

#[test]
fn all_invalid_grid_has_no_winner() {
    let bars = fixture_bars(100);
    let base = RunConfig {
        strategy: StrategyConfig::Momentum(MomentumParams::default()),
        ..base_config()
    };
    let grid = ParamGrid::new().with("macd_fast", vec![26.0, 30.0]);
    assert!(matches!(
        Optimizer::new().optimize(&base, &grid, &bars),
        Err(OptimizeError::NoValidCombination { skipped: 2 })
    ));
}

#[test]
fn cells_longer_than_the_series_are_skipped() {
    let bars = fixture_bars(30);
    let grid = ParamGrid::new().with("period", vec![10.0, 20.0, 40.0]);
    let result = Optimizer::new().optimize(&base_config(), &grid, &bars).unwrap();

    assert_eq!(result.evaluated(), 2);
    let evaluated: Vec<f64> = result.all_results.iter().map(|c| c.params["period"]).collect();
    assert_eq!(evaluated, vec![10.0, 20.0]);

    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].params["period"], 40.0);
    assert!(result.skipped[0].reason.contains("need at least 40"));
}

#[test]
fn every_cell_too_long_has_no_winner() {
    let bars = fixture_bars(15);
    let grid = ParamGrid::new().with("period", vec![20.0, 30.0]);
    for parallel in [true, false] {
        assert!(matches!(
            Optimizer::new()
                .with_parallelism(parallel)
                .optimize(&base_config(), &grid, &bars),
            Err(OptimizeError::NoValidCombination { skipped: 2 })
        ));
    }
}
