//! PulseLab CLI: backtest, optimize and gas forecast commands.
//!
//! Commands:
//! - `backtest`: run one strategy from a TOML config over a CSV of bars
//! - `optimize`: grid-search the config's `[optimize.ranges]`
//! - `gas`: forecast gas prices from a CSV of observations

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pulselab_core::backtest::ProfitFactor;
use pulselab_core::domain::{GasPrediction, GasTrend, Horizon, Recommendation};
use pulselab_core::gas::GasForecaster;
use pulselab_runner::export::{save_artifacts, save_optimization_artifacts};
use pulselab_runner::{
    load_bars_csv, load_gas_csv, parse_timestamp, run_single_backtest, OptimizationResult,
    Optimizer, RunConfig, RunReport,
};

#[derive(Parser)]
#[command(
    name = "pulselab",
    about = "PulseLab CLI: strategy backtesting and gas price forecasting"
)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence when set).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest.
    Backtest {
        /// Path to a TOML run config.
        #[arg(long)]
        config: PathBuf,

        /// CSV of bars: timestamp,open,high,low,close,volume.
        #[arg(long)]
        bars: PathBuf,

        /// Directory for report.json, trades.csv and capital.csv.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Grid-search the ranges in the config's [optimize.ranges] table.
    Optimize {
        /// Path to a TOML run config.
        #[arg(long)]
        config: PathBuf,

        /// CSV of bars: timestamp,open,high,low,close,volume.
        #[arg(long)]
        bars: PathBuf,

        /// Evaluate cells one at a time instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Number of leaderboard rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Directory for optimization.json, leaderboard.csv and trades.csv.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Forecast gas prices and advise on transaction timing.
    Gas {
        /// CSV of gas observations, oldest first.
        #[arg(long)]
        points: PathBuf,

        /// TOML run config; only its [gas] section is used.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Judge data staleness at this instant (RFC 3339 or unix seconds)
        /// instead of the current time.
        #[arg(long)]
        as_of: Option<String>,

        /// Print the prediction as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Backtest {
            config,
            bars,
            output,
        } => run_backtest_cmd(&config, &bars, output.as_deref()),
        Commands::Optimize {
            config,
            bars,
            sequential,
            top,
            output,
        } => run_optimize_cmd(&config, &bars, sequential, top, output.as_deref()),
        Commands::Gas {
            points,
            config,
            as_of,
            json,
        } => run_gas_cmd(&points, config.as_deref(), as_of.as_deref(), json),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "pulselab=debug,pulselab_core=debug,pulselab_runner=debug,warn"
    } else {
        "pulselab=info,pulselab_core=info,pulselab_runner=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();
}

fn load_config(path: &Path) -> Result<RunConfig> {
    RunConfig::from_file(path).with_context(|| format!("failed to load config {}", path.display()))
}

fn run_backtest_cmd(config_path: &Path, bars_path: &Path, output: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let report = run_single_backtest(&config, bars_path)
        .with_context(|| format!("backtest failed on {}", bars_path.display()))?;

    print_report(&report);

    if let Some(dir) = output {
        let run_dir = save_artifacts(&report, dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_optimize_cmd(
    config_path: &Path,
    bars_path: &Path,
    sequential: bool,
    top: usize,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    if config.optimize.ranges.is_empty() {
        bail!(
            "{} has no [optimize.ranges] table to search",
            config_path.display()
        );
    }
    let bars = load_bars_csv(bars_path)
        .with_context(|| format!("failed to load bars from {}", bars_path.display()))?;
    tracing::info!(bars = bars.len(), path = %bars_path.display(), "loaded bars");

    let result = Optimizer::new()
        .with_parallelism(!sequential)
        .optimize(&config, &config.optimize.ranges, &bars)?;

    print_leaderboard(&result, top);

    if let Some(dir) = output {
        let run_dir = save_optimization_artifacts(&result, &config.config_id()?, dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_gas_cmd(
    points_path: &Path,
    config_path: Option<&Path>,
    as_of: Option<&str>,
    json: bool,
) -> Result<()> {
    let gas_config = match config_path {
        Some(path) => load_config(path)?.gas,
        None => Default::default(),
    };
    let points = load_gas_csv(points_path)
        .with_context(|| format!("failed to load gas points from {}", points_path.display()))?;
    tracing::info!(points = points.len(), "loaded gas observations");

    let forecaster = GasForecaster::new(gas_config)?;
    let prediction = match as_of {
        Some(raw) => {
            let Some(now) = parse_timestamp(raw) else {
                bail!("--as-of '{raw}' is neither RFC 3339 nor unix seconds");
            };
            forecaster.forecast(&points, now)?
        }
        None => forecaster.forecast_now(&points)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        print_prediction(&prediction, points.len());
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    let result = &report.result;
    let stats = &result.stats;
    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {}", report.strategy.name());
    println!("Config:         {}", &report.config_id[..12.min(report.config_id.len())]);
    println!(
        "Period:         {} to {}",
        result.start.format("%Y-%m-%d"),
        result.end.format("%Y-%m-%d")
    );
    println!("Bars:           {}", result.bar_count);
    println!("Signals:        {}", result.signal_count);
    println!(
        "Trades:         {} ({} won, {} lost)",
        stats.total_trades, stats.winning_trades, stats.losing_trades
    );
    println!();
    println!("--- Performance ---");
    println!(
        "Capital:        {:.2} -> {:.2}",
        result.initial_capital, result.final_capital
    );
    println!("Total Return:   {:.2}%", stats.total_return_pct);
    println!("Annualized:     {:.2}%", stats.annualized_return_pct);
    println!("Sharpe:         {:.3}", stats.sharpe_ratio);
    println!("Max Drawdown:   {:.2}%", stats.max_drawdown_pct);
    println!("Win Rate:       {:.1}%", stats.win_rate);
    println!("Profit Factor:  {}", format_profit_factor(stats.profit_factor));
    println!("Expectancy:     {:.2}", stats.expectancy);
    println!("Commission:     {:.2}", stats.total_commission);
    println!("Max Consec Win: {}", stats.max_consecutive_wins);
    println!("Max Consec Loss:{}", stats.max_consecutive_losses);
    println!("Avg Duration:   {:.1} days", stats.avg_trade_duration_days);
    if let Some(pos) = &result.open_position {
        println!();
        println!(
            "NOTE: position opened at bar {} ({:.4}) still open, excluded from statistics",
            pos.entry_bar, pos.entry_price
        );
    }
    println!();
}

fn format_profit_factor(pf: ProfitFactor) -> String {
    match pf {
        ProfitFactor::Infinite => "inf".to_string(),
        ProfitFactor::Finite(v) => format!("{v:.2}"),
    }
}

fn print_leaderboard(result: &OptimizationResult, top: usize) {
    let names: Vec<&str> = result.best_params.keys().map(String::as_str).collect();
    println!();
    println!("=== Optimization Result ===");
    println!("Strategy:       {}", result.best_strategy.name());
    println!("Evaluated:      {}", result.evaluated());
    println!("Skipped:        {}", result.skipped.len());
    println!();

    let params_header = names.join(", ");
    println!(
        "{:>4}  {:<32} {:>8} {:>9} {:>8} {:>7}",
        "Rank", params_header, "Sharpe", "Return%", "MaxDD%", "Trades"
    );
    println!("{}", "-".repeat(74));
    for (rank, cell) in result.leaderboard().into_iter().take(top).enumerate() {
        let values: Vec<String> = names
            .iter()
            .map(|n| cell.params.get(*n).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        let stats = &cell.result.stats;
        println!(
            "{:>4}  {:<32} {:>8.3} {:>9.2} {:>8.2} {:>7}",
            rank + 1,
            values.join(", "),
            stats.sharpe_ratio,
            stats.total_return_pct,
            stats.max_drawdown_pct,
            stats.total_trades
        );
    }
    for skipped in &result.skipped {
        println!("skipped {:?}: {}", skipped.params, skipped.reason);
    }
    println!();
}

fn trend_label(trend: GasTrend) -> &'static str {
    match trend {
        GasTrend::Rising => "rising",
        GasTrend::Falling => "falling",
        GasTrend::Stable => "stable",
    }
}

fn recommendation_label(rec: Recommendation) -> &'static str {
    match rec {
        Recommendation::SendNow => "SEND NOW",
        Recommendation::Wait => "WAIT",
        Recommendation::Urgent => "URGENT",
    }
}

fn horizon_label(horizon: Horizon) -> &'static str {
    match horizon {
        Horizon::FiveMinutes => "5m",
        Horizon::FifteenMinutes => "15m",
        Horizon::OneHour => "1h",
        Horizon::FourHours => "4h",
    }
}

fn print_prediction(p: &GasPrediction, observations: usize) {
    println!();
    println!("=== Gas Forecast ===");
    println!("Observations:   {observations}");
    println!("Current:        {:.3} gwei", p.current);
    println!("EMA:            {:.3} gwei", p.ema);
    println!(
        "Trend:          {} ({:+.1}%)",
        trend_label(p.trend),
        p.trend_change * 100.0
    );
    println!("Volatility:     {:.3}", p.volatility);
    println!("Confidence:     {:.0}", p.confidence);
    println!();
    for horizon in Horizon::ALL {
        println!(
            "  {:<4} {:>10.3} gwei",
            horizon_label(horizon),
            p.predictions.get(horizon)
        );
    }
    println!();
    println!(
        "Advice:         {} (best {}, {:.1}% savings)",
        recommendation_label(p.recommendation),
        horizon_label(p.best_horizon),
        p.expected_savings_pct
    );
    println!();
}
