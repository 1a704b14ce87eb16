use analyzer::{Analyzer, ComparisonReport, SeriesStats, SweepRecord, SweepSummary, append_record};
use anyhow::{Context, Result};
use backtester::{BacktestReport, Backtester};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::load_config;
use core_types::RebalanceLog;
use events::{EventSource, HistoricalEvents};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// The main entry point for the Vaultsim backtester.
#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; everything can come from the config file.
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => handle_run(args).await,
        Commands::Analyze(args) => handle_analyze(args).await,
    };
    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "Command failed");
    }
    result
}

/// Logs to stdout (`RUST_LOG`, default `info`) and to a daily file under `logs/`.
fn init_tracing() -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily("logs", "vaultsim.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stdout_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact().with_filter(stdout_filter);
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry().with(stdout_layer).with(file_layer).init();
    guard
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Backtests an ALM vault with a leveraged debt overlay against historical pool events.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay one configured window and report vault against hold.
    Run(RunArgs),
    /// Summarize or compare parameter-sweep result files.
    Analyze(AnalyzeArgs),
}

#[derive(Parser)]
struct RunArgs {
    /// Path to the run configuration (TOML).
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `data.events_dir`.
    #[arg(long)]
    events_dir: Option<PathBuf>,

    /// Write every executed rebalance here as JSON lines.
    #[arg(long)]
    rebalance_log: Option<PathBuf>,

    /// Append this run's sweep record (APY and parameters) to this file.
    #[arg(long)]
    results: Option<PathBuf>,

    /// Hide the progress bar.
    #[arg(long)]
    no_progress: bool,
}

#[derive(Parser)]
struct AnalyzeArgs {
    /// Sweep results to summarize, or the baseline of a comparison.
    #[arg(long)]
    baseline: PathBuf,

    /// Sweep results to compare against the baseline.
    #[arg(long)]
    candidate: Option<PathBuf>,

    /// How many combinations to list per ranking.
    #[arg(long, default_value_t = 10)]
    top: usize,
}

// ==============================================================================
// Run Command Logic
// ==============================================================================

async fn handle_run(args: RunArgs) -> Result<()> {
    let config =
        load_config(&args.config).with_context(|| format!("failed to load {}", args.config.display()))?;
    let events_dir = args.events_dir.clone().unwrap_or_else(|| config.data.events_dir.clone());
    let history = HistoricalEvents::from_jsonl_dir(&events_dir)
        .await
        .with_context(|| format!("failed to load events from {}", events_dir.display()))?;
    let source: Arc<dyn EventSource> = Arc::new(history);

    let run_id = Uuid::new_v4();
    let backtester = Backtester::from_config(run_id, &config, source).await?.with_progress(!args.no_progress);

    let cancel = backtester.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping at the next checkpoint");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    match backtester.run(config.backtest.start_date, config.backtest.end_date).await {
        Ok(report) => {
            if let Some(path) = &args.rebalance_log {
                write_rebalance_log(path, &report.rebalances).await?;
            }
            if let Some(path) = &args.results {
                append_record(path, &SweepRecord::from_report(&config, &report.performance)).await?;
            }
            print_run_report(&report);
            Ok(())
        }
        Err(e) => {
            if let Some(path) = &args.results {
                append_record(path, &SweepRecord::failed(&config, &e)).await?;
            }
            Err(e).with_context(|| format!("backtest {run_id} failed"))
        }
    }
}

async fn write_rebalance_log(path: &Path, logs: &[RebalanceLog]) -> Result<()> {
    let mut contents = String::new();
    for log in logs {
        contents.push_str(&serde_json::to_string(log)?);
        contents.push('\n');
    }
    tokio::fs::write(path, contents).await.with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), records = logs.len(), "Rebalance log written");
    Ok(())
}

fn print_run_report(report: &BacktestReport) {
    let p = &report.performance;
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    let rows = [
        ("Run", report.run_id.to_string()),
        ("Window", format!("{} .. {}", p.start, p.end)),
        ("Periods", report.periods.to_string()),
        ("Events applied / skipped", format!("{} / {}", report.events_applied, report.events_skipped)),
        ("Initial value", p.initial_value.to_string()),
        ("Final vault equity", p.final_vault_value.to_string()),
        ("Final hold value", p.final_hold_value.to_string()),
        ("Vault return %", p.vault_return_pct.to_string()),
        ("Hold return %", p.hold_return_pct.to_string()),
        ("Vault APY %", p.vault_apy_pct.to_string()),
        ("Hold APY %", p.hold_apy_pct.to_string()),
        ("APY difference %", p.apy_diff_pct.to_string()),
        ("Max drawdown %", p.max_drawdown_pct.to_string()),
        ("Sharpe", p.sharpe_ratio.map_or_else(|| "n/a".to_string(), |s| s.to_string())),
        ("ALM / DLV rebalances", format!("{} / {}", p.alm_rebalances, p.dlv_rebalances)),
        ("Swap fees paid", p.total_swap_fees.to_string()),
        ("Final debt", p.final_debt.to_string()),
        ("Realized IL (bps)", p.realized_il_bps.to_string()),
    ];
    for (metric, value) in rows {
        table.add_row(vec![metric.to_string(), value]);
    }
    println!("{table}");
}

// ==============================================================================
// Analyze Command Logic
// ==============================================================================

async fn handle_analyze(args: AnalyzeArgs) -> Result<()> {
    let analyzer = Analyzer::new();
    match &args.candidate {
        None => {
            let summary = analyzer.summarize_file(&args.baseline).await?;
            println!("{}", summary_table("Runs", &summary));
        }
        Some(candidate) => {
            let report = analyzer.compare_files(&args.baseline, candidate).await?;
            print_comparison(&report, args.top);
        }
    }
    Ok(())
}

fn stats_row(name: &str, stats: &SeriesStats) -> Vec<String> {
    vec![
        name.to_string(),
        stats.mean.round_dp(2).to_string(),
        stats.median.round_dp(2).to_string(),
        stats.min.round_dp(2).to_string(),
        stats.max.round_dp(2).to_string(),
        stats.stddev.round_dp(2).to_string(),
    ]
}

fn summary_table(title: &str, summary: &SweepSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        format!("{title} ({}/{} ok)", summary.successful, summary.total),
        "Mean".to_string(),
        "Median".to_string(),
        "Min".to_string(),
        "Max".to_string(),
        "Stddev".to_string(),
    ]);
    table.add_row(stats_row("Vault APY %", &summary.vault));
    table.add_row(stats_row("Hold APY %", &summary.hold));
    table.add_row(stats_row("Diff APY %", &summary.diff));
    table
}

fn print_comparison(report: &ComparisonReport, top: usize) {
    println!("{}", summary_table("Baseline", &report.baseline));
    println!("{}", summary_table("Candidate", &report.candidate));
    println!("Matched combinations: {}", report.matched.len());

    let rankings = [
        ("Biggest vault APY improvements", report.top_improvements(top)),
        ("Biggest absolute vault APY changes", report.top_absolute_changes(top)),
    ];
    for (title, ranked) in rankings {
        let mut table = Table::new();
        table.set_header(vec![title, "Vault APY %", "Diff APY %", "Wide / Base", "Dev above / below"]);
        for c in ranked {
            table.add_row(vec![
                c.key.clone(),
                format!("{} -> {} ({:+})", c.baseline.vault.round_dp(2), c.candidate.vault.round_dp(2), c.vault_change.round_dp(2)),
                format!("{} -> {} ({:+})", c.baseline.diff.round_dp(2), c.candidate.diff.round_dp(2), c.diff_change.round_dp(2)),
                format!("{} / {}", c.ranges.wide_threshold, c.ranges.base_threshold),
                format!("{} / {}", c.dlv.deviation_threshold_above, c.dlv.deviation_threshold_below),
            ]);
        }
        println!("{table}");
    }

    if let (Some(vault), Some(diff)) = (&report.vault_change, &report.diff_change) {
        let mut table = Table::new();
        table.set_header(vec!["Change", "Mean", "Median", "Min", "Max", "Stddev"]);
        table.add_row(stats_row("Vault APY %", vault));
        table.add_row(stats_row("Diff APY %", diff));
        println!("{table}");
        println!(
            "Positive vault changes: {}/{} ({}%)",
            report.positive_vault_changes,
            report.matched.len(),
            report.positive_vault_share_pct()
        );
        println!(
            "Positive diff changes:  {}/{} ({}%)",
            report.positive_diff_changes,
            report.matched.len(),
            report.positive_diff_share_pct()
        );
    }
}
