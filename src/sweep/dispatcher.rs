//! Per-file dispatcher
//!
//! Streams one input file line by line, skips URLs that already have a
//! completion record, and launches a probe task for every other line.
//!
//! Checkpoints are a low-water mark: the index of the earliest line whose
//! probe has not yet delivered its outcome, or the number of lines scanned
//! when nothing is in flight. A run cut short therefore resumes at or before
//! every unfinished probe, and the cache weeds out lines already recorded.

use crate::output::render_progress;
use crate::storage::{Namespace, ReadStore, StoreError};
use crate::sweep::governor::RateGovernor;
use crate::sweep::prober::Prober;
use crate::sweep::{CheckpointUpdate, DroppedWriteKind, ResultSinks, Undelivered};
use crate::SweepError;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

const PROGRESS_WIDTH: usize = 20;

/// Why a stored checkpoint could not be used
///
/// Either way the file is scanned from line 0.
#[derive(Debug, Error)]
pub enum CheckpointFault {
    #[error("checkpoint could not be read: {0}")]
    Unreadable(#[source] StoreError),

    #[error("checkpoint value {0:?} is not a line count")]
    Malformed(String),
}

/// A cache lookup that failed; the URL was probed as if uncached
#[derive(Debug, Error)]
#[error("cache lookup for {url} failed: {source}")]
pub struct CacheReadFailed {
    pub url: String,
    #[source]
    pub source: StoreError,
}

/// Reads the line offset at which scanning of `file_key` resumes
///
/// A file without a checkpoint starts at 0.
pub fn resume_offset<R: ReadStore + ?Sized>(
    reader: &R,
    file_key: &str,
) -> Result<u64, CheckpointFault> {
    match reader.get(Namespace::FileCheckpoints, file_key) {
        Ok(None) => Ok(0),
        Ok(Some(value)) => value
            .parse::<u64>()
            .map_err(|_| CheckpointFault::Malformed(value)),
        Err(e) => Err(CheckpointFault::Unreadable(e)),
    }
}

/// What happened while dispatching one file
#[derive(Debug)]
pub struct DispatchReport {
    pub file: PathBuf,
    /// Lines in the file
    pub total_lines: u64,
    /// Line index scanning started at
    pub resume_offset: u64,
    /// Set when a stored checkpoint was ignored
    pub checkpoint_fault: Option<CheckpointFault>,
    pub probes_launched: u64,
    pub cache_hits: u64,
    /// Whitespace-only lines; these are neither probed nor failure-logged
    pub blank_lines: u64,
    /// Cache lookups that failed and were treated as misses
    pub cache_read_failures: Vec<CacheReadFailed>,
    /// Outcomes and checkpoints sent after the aggregator had stopped
    pub undelivered: Vec<Undelivered>,
}

impl DispatchReport {
    fn new(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            total_lines: 0,
            resume_offset: 0,
            checkpoint_fault: None,
            probes_launched: 0,
            cache_hits: 0,
            blank_lines: 0,
            cache_read_failures: Vec::new(),
            undelivered: Vec::new(),
        }
    }
}

/// A probe task's line index and whether its outcome reached the aggregator
type ProbeDone = (u64, Result<(), Undelivered>);

/// Dispatches probes for one input file at a time
pub struct Dispatcher<R> {
    reader: R,
    prober: Prober,
    governor: RateGovernor,
    in_flight: Arc<Semaphore>,
    sinks: ResultSinks,
    checkpoint_interval: u64,
}

impl<R: ReadStore> Dispatcher<R> {
    /// Creates a dispatcher
    ///
    /// # Arguments
    ///
    /// * `reader` - Read access to the URL cache and checkpoints
    /// * `prober` - Prober cloned into every probe task
    /// * `governor` - Paces probe launches
    /// * `in_flight` - Caps how many probe tasks run at once
    /// * `sinks` - Channels to the aggregator
    /// * `checkpoint_interval` - Lines scanned between periodic checkpoints
    pub fn new(
        reader: R,
        prober: Prober,
        governor: RateGovernor,
        in_flight: Arc<Semaphore>,
        sinks: ResultSinks,
        checkpoint_interval: u64,
    ) -> Self {
        Self {
            reader,
            prober,
            governor,
            in_flight,
            sinks,
            checkpoint_interval: checkpoint_interval.max(1),
        }
    }

    /// Scans `path` from its checkpoint to the end and probes uncached URLs
    ///
    /// Returns once every probe launched for this file has delivered its
    /// outcome and the final checkpoint has been queued.
    ///
    /// # Errors
    ///
    /// Failing to open or read the file is fatal for the whole run.
    pub async fn dispatch_file(&mut self, path: &Path) -> Result<DispatchReport, SweepError> {
        let file_key = path.to_string_lossy().into_owned();
        let input_error = |source: io::Error| SweepError::InputFile {
            path: path.to_path_buf(),
            source,
        };

        let mut report = DispatchReport::new(path);
        report.total_lines = count_lines(path).await.map_err(input_error)?;

        report.resume_offset = match resume_offset(&self.reader, &file_key) {
            Ok(offset) => offset,
            Err(fault) => {
                tracing::warn!("Ignoring checkpoint for {}: {}", file_key, fault);
                report.checkpoint_fault = Some(fault);
                0
            }
        };
        if report.resume_offset > 0 {
            tracing::info!(
                "Resuming {} at line {}",
                file_key,
                report.resume_offset
            );
        }

        let file = File::open(path).await.map_err(input_error)?;
        let mut lines = BufReader::new(file);
        let mut buf = Vec::new();
        let mut probes: JoinSet<ProbeDone> = JoinSet::new();
        let mut pending = BTreeSet::new();
        let mut scanned: u64 = 0;

        while let Some(line) = read_line(&mut lines, &mut buf)
            .await
            .map_err(input_error)?
        {
            let index = scanned;
            scanned += 1;
            if scanned <= report.resume_offset {
                continue;
            }

            if line.trim().is_empty() {
                report.blank_lines += 1;
            } else if self.is_cached(&line, &mut report) {
                report.cache_hits += 1;
            } else {
                self.launch(index, line, &mut probes).await?;
                pending.insert(index);
                report.probes_launched += 1;
            }

            while let Some(joined) = probes.try_join_next() {
                settle(joined, &mut pending, &mut report);
            }

            if scanned % self.checkpoint_interval == 0 {
                let mark = low_water_mark(&pending, scanned);
                if let Err(e) = send_checkpoint(&self.sinks, &file_key, mark).await {
                    report.undelivered.push(e);
                }
                tracing::info!(
                    "{}",
                    render_progress("File progress", scanned, report.total_lines, PROGRESS_WIDTH)
                );
            }
        }

        while let Some(joined) = probes.join_next().await {
            settle(joined, &mut pending, &mut report);
        }

        let mark = low_water_mark(&pending, scanned);
        if let Err(e) = send_checkpoint(&self.sinks, &file_key, mark).await {
            report.undelivered.push(e);
        }
        tracing::info!(
            "{}",
            render_progress("File progress", scanned, report.total_lines, PROGRESS_WIDTH)
        );

        Ok(report)
    }

    fn is_cached(&self, url: &str, report: &mut DispatchReport) -> bool {
        match self.reader.is_cached(url) {
            Ok(cached) => cached,
            Err(source) => {
                let failure = CacheReadFailed {
                    url: url.to_string(),
                    source,
                };
                tracing::warn!("{}, probing anyway", failure);
                report.cache_read_failures.push(failure);
                false
            }
        }
    }

    /// Waits for a free slot and a rate token, then spawns the probe
    async fn launch(
        &mut self,
        index: u64,
        url: String,
        probes: &mut JoinSet<ProbeDone>,
    ) -> Result<(), SweepError> {
        let permit = self
            .in_flight
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SweepError::PoolClosed)?;
        self.governor.acquire().await;

        let prober = self.prober.clone();
        let sinks = self.sinks.clone();
        probes.spawn(async move {
            let outcome = prober.probe(&url).await;
            let delivery = sinks.deliver(url, outcome).await;
            drop(permit);
            (index, delivery)
        });

        Ok(())
    }
}

/// Earliest line still waiting on its probe, or `scanned` if none is
fn low_water_mark(pending: &BTreeSet<u64>, scanned: u64) -> u64 {
    pending.first().copied().unwrap_or(scanned)
}

/// Retires a finished probe task
///
/// A task that panicked keeps its line pending, which pins the checkpoint
/// below it.
fn settle(
    joined: Result<ProbeDone, JoinError>,
    pending: &mut BTreeSet<u64>,
    report: &mut DispatchReport,
) {
    match joined {
        Ok((index, delivery)) => {
            pending.remove(&index);
            if let Err(e) = delivery {
                report.undelivered.push(e);
            }
        }
        Err(e) => tracing::error!("Probe task ended abnormally: {}", e),
    }
}

/// Queues a checkpoint for the aggregator
///
/// Takes the sinks rather than the dispatcher so the cache reader is never
/// borrowed across an await.
async fn send_checkpoint(
    sinks: &ResultSinks,
    file_key: &str,
    lines_scanned: u64,
) -> Result<(), Undelivered> {
    let update = CheckpointUpdate {
        file: file_key.to_string(),
        lines_scanned,
    };
    sinks.checkpoints.send(update).await.map_err(|e| {
        let lost = Undelivered {
            kind: DroppedWriteKind::Checkpoint,
            key: e.0.file,
        };
        tracing::error!("{}", lost);
        lost
    })
}

/// Reads one line without its terminator (`\n` or `\r\n`)
///
/// Invalid UTF-8 is replaced rather than rejected.
async fn read_line(
    reader: &mut BufReader<File>,
    buf: &mut Vec<u8>,
) -> io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// Counts lines, including a final line without a terminator
pub async fn count_lines(path: &Path) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(path).await?);
    let mut buf = Vec::new();
    let mut count = 0;
    while read_line(&mut reader, &mut buf).await?.is_some() {
        count += 1;
    }
    Ok(count)
}
