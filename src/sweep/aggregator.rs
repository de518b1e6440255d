//! Aggregator: the single writer of durable state
//!
//! Every result, failure and checkpoint produced anywhere in the pipeline
//! passes through this loop, so the store and the failure log are only ever
//! touched from one task and need no locking. A write that fails is logged
//! and recorded as a [`DroppedWrite`]; it never stops the loop.

use crate::output::FailureLog;
use crate::storage::{Namespace, Store};
use crate::sweep::{CheckpointUpdate, ProbeSuccess, ResultStreams};

/// Which kind of record a dropped write was carrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DroppedWriteKind {
    UrlRecord,
    Checkpoint,
    FailureLine,
}

/// A write the aggregator could not persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedWrite {
    pub kind: DroppedWriteKind,
    /// URL or file path the record was keyed by
    pub key: String,
    pub error: String,
}

/// Counters for one aggregator run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorReport {
    pub records_written: u64,
    pub failures_logged: u64,
    pub checkpoints_written: u64,
    pub dropped: Vec<DroppedWrite>,
}

/// Serializes all pipeline output into the store and the failure log
pub struct Aggregator<S> {
    store: S,
    failure_log: FailureLog,
    report: AggregatorReport,
}

impl<S: Store> Aggregator<S> {
    pub fn new(store: S, failure_log: FailureLog) -> Self {
        Self {
            store,
            failure_log,
            report: AggregatorReport::default(),
        }
    }

    /// Consumes events until the completion signal arrives
    ///
    /// Results are preferred over the completion signal, and anything still
    /// buffered when it arrives is written before returning. The loop also
    /// ends if every producer and the completion sender are gone.
    ///
    /// Hands the store back so the caller can close out the run.
    pub async fn run(mut self, mut streams: ResultStreams) -> (S, AggregatorReport) {
        loop {
            tokio::select! {
                biased;

                Some(success) = streams.successes.recv() => self.record_success(success),
                Some(url) = streams.failures.recv() => self.record_failure(&url),
                Some(update) = streams.checkpoints.recv() => self.record_checkpoint(update),
                _ = &mut streams.done => {
                    self.drain(&mut streams);
                    break;
                }
                else => break,
            }
        }

        tracing::debug!(
            "Aggregator finished: {} records, {} failures, {} checkpoints, {} dropped",
            self.report.records_written,
            self.report.failures_logged,
            self.report.checkpoints_written,
            self.report.dropped.len()
        );
        (self.store, self.report)
    }

    fn drain(&mut self, streams: &mut ResultStreams) {
        while let Ok(success) = streams.successes.try_recv() {
            self.record_success(success);
        }
        while let Ok(url) = streams.failures.try_recv() {
            self.record_failure(&url);
        }
        while let Ok(update) = streams.checkpoints.try_recv() {
            self.record_checkpoint(update);
        }
    }

    fn record_success(&mut self, success: ProbeSuccess) {
        let latency = success.latency_ms.to_string();
        match self.store.put(Namespace::UrlCache, &success.url, &latency) {
            Ok(()) => self.report.records_written += 1,
            Err(e) => self.drop_write(DroppedWriteKind::UrlRecord, success.url, e.to_string()),
        }
    }

    fn record_failure(&mut self, url: &str) {
        match self.failure_log.append(url) {
            Ok(()) => self.report.failures_logged += 1,
            Err(e) => self.drop_write(DroppedWriteKind::FailureLine, url.to_string(), e.to_string()),
        }
    }

    fn record_checkpoint(&mut self, update: CheckpointUpdate) {
        let value = update.lines_scanned.to_string();
        match self
            .store
            .put(Namespace::FileCheckpoints, &update.file, &value)
        {
            Ok(()) => {
                self.report.checkpoints_written += 1;
                tracing::debug!("Checkpoint {} -> {}", update.file, value);
            }
            Err(e) => self.drop_write(DroppedWriteKind::Checkpoint, update.file, e.to_string()),
        }
    }

    fn drop_write(&mut self, kind: DroppedWriteKind, key: String, error: String) {
        tracing::error!("Dropped {:?} write for {}: {}", kind, key, error);
        self.report.dropped.push(DroppedWrite { kind, key, error });
    }
}
