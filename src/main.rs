//! Probe-Sweep main entry point
//!
//! This is the command-line interface for the Probe-Sweep bulk URL prober.

use clap::Parser;
use probe_sweep::config::{load_config_with_hash, Config};
use probe_sweep::storage::{Namespace, ReadStore, SqliteReader};
use probe_sweep::sweep::{count_lines, list_input_files, resume_offset, run_sweep};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Probe-Sweep: a resumable bulk URL prober
///
/// Sends one HEAD request per URL found in the input files, records the
/// latency of every URL that answers and logs the ones that never do.
/// Interrupted runs pick up where they left off.
#[derive(Parser, Debug)]
#[command(name = "probe-sweep")]
#[command(version)]
#[command(about = "A resumable bulk URL prober", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be probed without probing
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show cache and checkpoint statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config).await?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_sweep(&config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("probe_sweep=info,warn"),
            1 => EnvFilter::new("probe_sweep=debug,info"),
            2 => EnvFilter::new("probe_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: lists input files and where each would resume
async fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Probe-Sweep Dry Run ===\n");

    println!("Probe Configuration:");
    println!(
        "  Target rate: {}/min ({} req/s)",
        config.probe.requests_per_minute,
        config.probe.requests_per_second()
    );
    println!("  Burst: {}", config.probe.burst);
    println!("  Max in flight: {}", config.probe.max_in_flight);
    println!("  Request timeout: {}s", config.probe.request_timeout_secs);
    println!(
        "  Checkpoint every: {} lines",
        config.probe.checkpoint_interval()
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!(
        "  Failed log: {} (rotates at {} MB)",
        config.output.failed_log_path, config.output.failed_log_max_size_mb
    );

    let files = list_input_files(Path::new(&config.input.directory)).await?;
    let db_path = Path::new(&config.output.database_path);
    let store = if db_path.exists() {
        Some(SqliteReader::open(db_path)?)
    } else {
        None
    };

    println!("\nInput Files ({}):", files.len());
    for file in &files {
        let lines = count_lines(file).await?;
        let offset = match &store {
            Some(store) => resume_offset(store, &file.to_string_lossy()).unwrap_or(0),
            None => 0,
        };
        println!("  - {} ({} lines, resume at {})", file.display(), lines, offset);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows what the database already holds
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let db_path = Path::new(&config.output.database_path);
    if !db_path.exists() {
        println!("No database yet, nothing has been swept.");
        return Ok(());
    }
    let store = SqliteReader::open(db_path)?;

    println!("=== Sweep Statistics ===\n");
    println!("  Cached URLs: {}", store.count(Namespace::UrlCache)?);

    let checkpoints = store.checkpoints()?;
    println!("  Checkpointed files: {}", checkpoints.len());
    for (file, lines) in &checkpoints {
        println!("    {}: {} lines scanned", file, lines);
    }

    if let Some(run) = store.latest_run()? {
        println!(
            "\n  Latest run: #{} {} (started {}{})",
            run.id,
            run.status.to_db_string(),
            run.started_at,
            run.finished_at
                .map(|f| format!(", finished {}", f))
                .unwrap_or_default()
        );
    }
    Ok(())
}

/// Handles the main sweep operation
async fn handle_sweep(config: &Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Sweeping {} at {}/min",
        config.input.directory,
        config.probe.requests_per_minute
    );

    match run_sweep(config, config_hash).await {
        Ok(report) => {
            tracing::info!(
                "Sweep run {} completed: {} files, {} probes launched, {} cache hits",
                report.run_id,
                report.files.len(),
                report.probes_launched(),
                report.cache_hits()
            );
            if !report.aggregate.dropped.is_empty() {
                tracing::warn!(
                    "{} results could not be persisted and will be probed again next run",
                    report.aggregate.dropped.len()
                );
            }
            if report.undelivered() > 0 {
                tracing::warn!(
                    "{} results were produced after the aggregator stopped",
                    report.undelivered()
                );
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Sweep failed: {}", e);
            Err(e.into())
        }
    }
}
