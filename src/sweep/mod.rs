//! Sweep module: the resumable probing pipeline
//!
//! This module contains the core sweep logic, including:
//! - HEAD probing with bounded retries
//! - Token-bucket rate governance and a bounded in-flight pool
//! - Per-file dispatching with resume checkpoints
//! - A single aggregator that owns every durable write
//! - The walker that drives dispatching across all input files
//!
//! Producers (probe tasks and the dispatcher) talk to the aggregator through
//! three bounded channels. The walker signals completion on a fourth,
//! one-shot channel once every file has been scanned.

mod aggregator;
mod dispatcher;
mod governor;
mod prober;
mod walker;

pub use aggregator::{Aggregator, AggregatorReport, DroppedWrite, DroppedWriteKind};
pub use dispatcher::{
    count_lines, resume_offset, CacheReadFailed, CheckpointFault, DispatchReport, Dispatcher,
};
pub use governor::RateGovernor;
pub use prober::{build_http_client, ProbeOutcome, Prober, MAX_RETRIES, RETRY_DELAY};
pub use walker::{list_input_files, Walker};

use crate::config::Config;
use crate::output::FailureLog;
use crate::storage::{ReadStore, RunStatus, SqliteStore, Store};
use crate::SweepError;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Semaphore};

/// A URL that answered, with the latency of its final attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSuccess {
    pub url: String,
    pub latency_ms: u64,
}

/// Number of lines of `file` scanned so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointUpdate {
    pub file: String,
    pub lines_scanned: u64,
}

/// A record sent after the aggregator had already stopped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("aggregator is gone, dropped {kind:?} for {key}")]
pub struct Undelivered {
    pub kind: DroppedWriteKind,
    /// URL or file path the record was keyed by
    pub key: String,
}

/// Producer ends of the aggregator channels
#[derive(Debug, Clone)]
pub struct ResultSinks {
    pub successes: mpsc::Sender<ProbeSuccess>,
    pub failures: mpsc::Sender<String>,
    pub checkpoints: mpsc::Sender<CheckpointUpdate>,
}

impl ResultSinks {
    /// Routes a probe outcome to the success or failure channel
    ///
    /// Blocks while the target channel is full.
    pub async fn deliver(&self, url: String, outcome: ProbeOutcome) -> Result<(), Undelivered> {
        let sent = match outcome {
            ProbeOutcome::Reachable { latency_ms, .. } => self
                .successes
                .send(ProbeSuccess { url, latency_ms })
                .await
                .map_err(|e| Undelivered {
                    kind: DroppedWriteKind::UrlRecord,
                    key: e.0.url,
                }),
            ProbeOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                tracing::warn!("{} failed after {} attempts: {}", url, attempts, last_error);
                self.failures.send(url).await.map_err(|e| Undelivered {
                    kind: DroppedWriteKind::FailureLine,
                    key: e.0,
                })
            }
        };

        if let Err(lost) = &sent {
            tracing::error!("{}", lost);
        }
        sent
    }
}

/// Consumer ends of the aggregator channels plus the completion signal
#[derive(Debug)]
pub struct ResultStreams {
    pub successes: mpsc::Receiver<ProbeSuccess>,
    pub failures: mpsc::Receiver<String>,
    pub checkpoints: mpsc::Receiver<CheckpointUpdate>,
    pub done: oneshot::Receiver<()>,
}

/// Creates the aggregator channels, each bounded to `capacity`
pub fn result_channels(capacity: usize) -> (ResultSinks, oneshot::Sender<()>, ResultStreams) {
    let (successes_tx, successes) = mpsc::channel(capacity);
    let (failures_tx, failures) = mpsc::channel(capacity);
    let (checkpoints_tx, checkpoints) = mpsc::channel(capacity);
    let (done_tx, done) = oneshot::channel();

    (
        ResultSinks {
            successes: successes_tx,
            failures: failures_tx,
            checkpoints: checkpoints_tx,
        },
        done_tx,
        ResultStreams {
            successes,
            failures,
            checkpoints,
            done,
        },
    )
}

/// Summary of one sweep run
#[derive(Debug)]
pub struct SweepReport {
    pub run_id: i64,
    pub files: Vec<DispatchReport>,
    pub aggregate: AggregatorReport,
}

impl SweepReport {
    /// Total probes launched across all files
    pub fn probes_launched(&self) -> u64 {
        self.files.iter().map(|f| f.probes_launched).sum()
    }

    /// Total lines skipped because their URL was already cached
    pub fn cache_hits(&self) -> u64 {
        self.files.iter().map(|f| f.cache_hits).sum()
    }

    /// Outcomes and checkpoints that never reached the aggregator
    pub fn undelivered(&self) -> usize {
        self.files.iter().map(|f| f.undelivered.len()).sum()
    }
}

/// Runs a complete sweep over the configured input directory
///
/// This is the main entry point. It will:
/// 1. Open the database (fatal on failure) and record a new run
/// 2. Open the failure log
/// 3. Spawn the walker, which dispatches every input file in turn
/// 4. Run the aggregator on the current task until the walker is done
/// 5. Mark the run completed or failed
///
/// # Example
///
/// ```no_run
/// use probe_sweep::config::load_config_with_hash;
/// use probe_sweep::sweep::run_sweep;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("sweep.toml"))?;
/// let report = run_sweep(&config, &hash).await?;
/// println!("{} probes launched", report.probes_launched());
/// # Ok(())
/// # }
/// ```
pub async fn run_sweep(config: &Config, config_hash: &str) -> Result<SweepReport, SweepError> {
    let mut store = SqliteStore::open(Path::new(&config.output.database_path))?;

    if let Some(previous) = store.latest_run()? {
        if previous.status == RunStatus::Running {
            tracing::info!(
                "Run {} (started {}) was interrupted, resuming from cache and checkpoints",
                previous.id,
                previous.started_at
            );
        }
    }
    let run_id = store.create_run(config_hash)?;
    tracing::info!("Starting sweep run {}", run_id);

    let log_path = Path::new(&config.output.failed_log_path);
    let failure_log = FailureLog::open(log_path, config.output.failed_log_max_size_mb).map_err(
        |source| SweepError::FailureLog {
            path: log_path.to_path_buf(),
            source,
        },
    )?;

    let reader = store.reader()?;
    let prober = Prober::new(&config.probe)?;
    let governor = RateGovernor::new(config.probe.requests_per_second(), config.probe.burst);
    let in_flight = Arc::new(Semaphore::new(config.probe.max_in_flight as usize));
    let (sinks, done, streams) = result_channels(config.probe.channel_capacity as usize);

    let dispatcher = Dispatcher::new(
        reader,
        prober,
        governor,
        in_flight,
        sinks,
        config.probe.checkpoint_interval(),
    );
    let walker = Walker::new(Path::new(&config.input.directory), dispatcher);
    let walk = tokio::spawn(walker.run(done));

    let (mut store, aggregate) = Aggregator::new(store, failure_log).run(streams).await;

    let walked = walk.await?;
    let status = if walked.is_ok() {
        RunStatus::Completed
    } else {
        RunStatus::Failed
    };
    if let Err(e) = store.finish_run(run_id, status) {
        tracing::warn!("Failed to record end of run {}: {}", run_id, e);
    }

    Ok(SweepReport {
        run_id,
        files: walked?,
        aggregate,
    })
}
