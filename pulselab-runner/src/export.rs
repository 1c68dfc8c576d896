//! Reporting and export: JSON and CSV artifact generation.
//!
//! - **JSON**: full run report with schema versioning
//! - **CSV**: trade tape, capital curve, optimizer leaderboard
//!
//! Persisted JSON carries a `schema_version` field. Newer versions than this
//! build understands are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use pulselab_core::backtest::{BacktestStats, CapitalPoint};
use pulselab_core::domain::Trade;

use crate::optimizer::{OptimizationResult, ParamSet, SkippedCell};
use crate::runner::{RunReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize run report to JSON")
}

/// Deserialize a `RunReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize run report from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

/// Compact optimizer summary: the winner plus skipped cells, no per-cell trades.
#[derive(Debug, Serialize)]
struct OptimizationSummary<'a> {
    schema_version: u32,
    config_id: &'a str,
    evaluated: usize,
    best_params: &'a ParamSet,
    best_stats: &'a BacktestStats,
    skipped: &'a [SkippedCell],
}

pub fn export_optimization_json(result: &OptimizationResult, config_id: &str) -> Result<String> {
    let summary = OptimizationSummary {
        schema_version: SCHEMA_VERSION,
        config_id,
        evaluated: result.evaluated(),
        best_params: &result.best_params,
        best_stats: &result.best_result.stats,
        skipped: &result.skipped,
    };
    serde_json::to_string_pretty(&summary).context("failed to serialize optimization summary")
}

// ─── CSV export ─────────────────────────────────────────────────────

fn label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: side, entry_bar, entry_time, entry_price, exit_bar, exit_time,
/// exit_price, quantity, gross_pnl, commission, pnl, pnl_pct, duration_secs,
/// exit_reason
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "side",
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "quantity",
        "gross_pnl",
        "commission",
        "pnl",
        "pnl_pct",
        "duration_secs",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            label(&t.side),
            t.entry_bar.to_string(),
            t.entry_time.to_rfc3339(),
            format!("{:.6}", t.entry_price),
            t.exit_bar.to_string(),
            t.exit_time.to_rfc3339(),
            format!("{:.6}", t.exit_price),
            format!("{:.6}", t.quantity),
            format!("{:.2}", t.gross_pnl),
            format!("{:.2}", t.commission),
            format!("{:.2}", t.pnl),
            format!("{:.4}", t.pnl_pct),
            t.duration_secs.to_string(),
            label(&t.exit_reason),
        ])?;
    }
    finish(wtr)
}

pub fn export_capital_csv(curve: &[CapitalPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "capital"])?;
    for p in curve {
        wtr.write_record([p.timestamp.to_rfc3339(), format!("{:.2}", p.capital)])?;
    }
    finish(wtr)
}

/// One row per evaluated cell, best Sharpe first. Parameter columns follow
/// the grid's names.
pub fn export_leaderboard_csv(result: &OptimizationResult) -> Result<String> {
    let names: Vec<&str> = result.best_params.keys().map(String::as_str).collect();
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["rank"];
    header.extend(names.iter().copied());
    header.extend([
        "sharpe_ratio",
        "total_return_pct",
        "max_drawdown_pct",
        "win_rate",
        "total_trades",
    ]);
    wtr.write_record(&header)?;

    for (rank, cell) in result.leaderboard().iter().enumerate() {
        let stats = &cell.result.stats;
        let mut row = vec![(rank + 1).to_string()];
        row.extend(
            names
                .iter()
                .map(|n| cell.params.get(*n).map(|v| v.to_string()).unwrap_or_default()),
        );
        row.extend([
            format!("{:.4}", stats.sharpe_ratio),
            format!("{:.2}", stats.total_return_pct),
            format!("{:.2}", stats.max_drawdown_pct),
            format!("{:.2}", stats.win_rate),
            stats.total_trades.to_string(),
        ]);
        wtr.write_record(&row)?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn run_dir(output_dir: &Path, prefix: &str, config_id: &str) -> Result<PathBuf> {
    let short = &config_id[..config_id.len().min(12)];
    let dir = output_dir.join(format!("{prefix}_{short}"));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;
    Ok(dir)
}

fn write(path: PathBuf, contents: &str) -> Result<()> {
    std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Save the artifact set for a single run.
///
/// Creates `{strategy}_{config_id prefix}/` under `output_dir` containing
/// `report.json`, `trades.csv` and `capital.csv`. Returns the directory.
pub fn save_artifacts(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let dir = run_dir(output_dir, report.strategy.name(), &report.config_id)?;
    write(dir.join("report.json"), &export_json(report)?)?;
    write(dir.join("trades.csv"), &export_trades_csv(&report.result.trades)?)?;
    write(
        dir.join("capital.csv"),
        &export_capital_csv(&report.result.capital_curve)?,
    )?;
    tracing::info!(dir = %dir.display(), "saved run artifacts");
    Ok(dir)
}

/// Save `optimization.json`, `leaderboard.csv` and the winner's `trades.csv`.
pub fn save_optimization_artifacts(
    result: &OptimizationResult,
    config_id: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    let dir = run_dir(output_dir, "optimize", config_id)?;
    write(
        dir.join("optimization.json"),
        &export_optimization_json(result, config_id)?,
    )?;
    write(dir.join("leaderboard.csv"), &export_leaderboard_csv(result)?)?;
    write(
        dir.join("trades.csv"),
        &export_trades_csv(&result.best_result.trades)?,
    )?;
    tracing::info!(dir = %dir.display(), "saved optimization artifacts");
    Ok(dir)
}
