//! Pricebook CLI: resolve sheet prices and manage the daily cache.
//!
//! Commands:
//! - `run`: read tickers from the workbook, resolve prices (cache or Yahoo Finance), write them back
//! - `cache status`: list snapshots with their ticker counts and sizes
//! - `cache clean`: remove snapshots older than a number of days

use anyhow::{bail, Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use pricebook_core::mode::MODE_PROMPT;
use pricebook_core::{
    CacheStore, CsvWorkbook, DateKey, Orchestrator, PriceBookConfig, RunMode, RunReport,
    Workbook, YahooProvider,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pricebook",
    about = "Pricebook CLI: daily cached stock prices for a spreadsheet"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve prices for every ticker in the workbook and write them back.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Workbook (CSV) path. Overrides the config file.
        #[arg(long)]
        workbook: Option<PathBuf>,

        /// Cache directory. Overrides the config file.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Fetch from the network without asking.
        #[arg(long, default_value_t = false, conflicts_with = "offline")]
        online: bool,

        /// Use cached data only, without asking.
        #[arg(long, default_value_t = false)]
        offline: bool,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List snapshots with ticker counts and sizes.
    Status {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Cache directory. Overrides the config file.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Remove snapshots dated more than the given number of days ago.
    Clean {
        /// Remove snapshots older than this many days.
        #[arg(long)]
        older_than_days: u32,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Cache directory. Overrides the config file.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            workbook,
            cache_dir,
            online,
            offline,
        } => {
            let mut config = load_config(config.as_deref(), cache_dir)?;
            if let Some(path) = workbook {
                config.workbook.path = path;
            }
            let mode = match (online, offline) {
                (true, _) => RunMode::Online,
                (_, true) => RunMode::Offline,
                _ => prompt_mode()?,
            };
            run_prices(&config, mode)
        }
        Commands::Cache { action } => match action {
            CacheAction::Status { config, cache_dir } => {
                let config = load_config(config.as_deref(), cache_dir)?;
                run_cache_status(&config.cache.dir)
            }
            CacheAction::Clean {
                older_than_days,
                config,
                cache_dir,
                confirm,
            } => {
                let config = load_config(config.as_deref(), cache_dir)?;
                run_cache_clean(&config.cache.dir, older_than_days, confirm)
            }
        },
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>, cache_dir: Option<PathBuf>) -> Result<PriceBookConfig> {
    let mut config = match path {
        Some(path) => PriceBookConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PriceBookConfig::default(),
    };
    if let Some(dir) = cache_dir {
        config.cache.dir = dir;
    }
    Ok(config)
}

/// Ask until the answer is y, n, or empty (= y).
fn prompt_mode() -> Result<RunMode> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    loop {
        print!("{MODE_PROMPT}");
        io::stdout().flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            bail!("no answer on stdin; pass --online or --offline");
        }

        match RunMode::from_answer(&answer) {
            Some(RunMode::Offline) => {
                println!("Note: only previously cached prices will be used.");
                return Ok(RunMode::Offline);
            }
            Some(mode) => return Ok(mode),
            None => println!("Please answer y or n."),
        }
    }
}

fn run_prices(config: &PriceBookConfig, mode: RunMode) -> Result<()> {
    let provider = YahooProvider::new(config.timeout()).context("building HTTP client")?;
    let mut book = CsvWorkbook::open(&config.workbook.path)
        .with_context(|| format!("opening workbook {}", config.workbook.path.display()))?;

    let orchestrator = Orchestrator::new(config, &provider);
    let outcome = orchestrator.run_today(&mut book, mode);

    // Rows already written are kept even when the run fails afterwards.
    book.save()
        .with_context(|| format!("saving workbook {}", book.path().display()))?;

    let report = outcome.context("price run failed")?;
    print_summary(&report, &config.fetch.failure_sentinel);
    Ok(())
}

fn print_summary(report: &RunReport, sentinel: &str) {
    println!();
    println!("=== Prices for {} ({}) ===", report.today, report.mode);
    println!("Read from:      {}", report.source);
    println!();
    println!("{:<12} {:>14}", "Ticker", "Price");
    println!("{}", "-".repeat(27));
    for row in &report.rows {
        match row.price() {
            Some(price) => println!("{:<12} {:>14}", row.ticker.as_str(), price),
            None => println!("{:<12} {:>14}", row.ticker.as_str(), sentinel),
        }
    }
    println!();
    println!(
        "Tickers: {}  cache hits: {}  network calls: {}  failed: {}",
        report.rows.len(),
        report.stats.cache_hits,
        report.stats.network_calls,
        report.failed_count()
    );
    match &report.persisted_to {
        Some(path) => println!("Cache saved to: {}", path.display()),
        None => println!("Cache not saved (offline mode)."),
    }
    println!();
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let store = CacheStore::new(cache_dir);
    let snapshots = store.list_snapshots()?;

    if snapshots.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let total_size: u64 = snapshots.iter().map(|s| s.size_bytes).sum();

    println!("Cache: {}", cache_dir.display());
    println!("Snapshots: {}", snapshots.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!("{:<12} {:<12} {:>10}", "Date", "Tickers", "Size");
    println!("{}", "-".repeat(36));
    for snapshot in &snapshots {
        let tickers = match store.load(snapshot.date) {
            Ok(cache) => cache.ticker_count().to_string(),
            Err(_) => "(corrupt)".to_string(),
        };
        println!(
            "{:<12} {:<12} {:>10}",
            snapshot.date.to_string(),
            tickers,
            format_size(snapshot.size_bytes)
        );
    }

    Ok(())
}

fn run_cache_clean(cache_dir: &Path, older_than_days: u32, confirm: bool) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cutoff = clean_cutoff(DateKey::today(), older_than_days)?;
    let store = CacheStore::new(cache_dir);
    let to_remove: Vec<_> = store
        .list_snapshots()?
        .into_iter()
        .filter(|s| s.date < cutoff)
        .collect();

    if to_remove.is_empty() {
        println!("No snapshots older than {older_than_days} days to remove.");
        return Ok(());
    }

    println!("Found {} snapshot(s) dated before {cutoff}:", to_remove.len());
    for snapshot in &to_remove {
        println!("  {} ({})", snapshot.date, format_size(snapshot.size_bytes));
    }

    if !confirm {
        println!();
        println!("Dry run. Pass --confirm to actually delete.");
        return Ok(());
    }

    for snapshot in &to_remove {
        store.remove(snapshot.date)?;
        info!(date = %snapshot.date, "snapshot removed");
        println!("Removed: {}", snapshot.date);
    }

    println!("Done. Removed {} snapshot(s).", to_remove.len());
    Ok(())
}

/// Snapshots dated before the returned key are older than `days`.
fn clean_cutoff(today: DateKey, days: u32) -> Result<DateKey> {
    today
        .date()
        .checked_sub_signed(Duration::days(i64::from(days)))
        .map(DateKey::new)
        .with_context(|| format!("--older-than-days {days} reaches before the earliest date"))
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
