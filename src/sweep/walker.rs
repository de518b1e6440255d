//! File-set walker
//!
//! Lists the input directory once, then hands each file to the dispatcher
//! in name order. Only one file is dispatched at a time.

use crate::output::render_progress;
use crate::storage::ReadStore;
use crate::sweep::dispatcher::{DispatchReport, Dispatcher};
use crate::SweepError;
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;

const PROGRESS_WIDTH: usize = 20;

/// Lists the regular files directly under `dir`, sorted by file name
///
/// Subdirectories are ignored. Each path is `dir` joined with the file
/// name, and that exact path is what checkpoints are keyed by.
pub async fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>, SweepError> {
    let list_error = |source: std::io::Error| SweepError::InputDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(list_error)?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(list_error)? {
        if entry.file_type().await.map_err(list_error)?.is_file() {
            names.push(entry.file_name());
        }
    }
    names.sort();

    Ok(names.into_iter().map(|name| dir.join(name)).collect())
}

/// Drives the dispatcher across every input file
pub struct Walker<R> {
    input_dir: PathBuf,
    dispatcher: Dispatcher<R>,
}

impl<R: ReadStore> Walker<R> {
    pub fn new(input_dir: &Path, dispatcher: Dispatcher<R>) -> Self {
        Self {
            input_dir: input_dir.to_path_buf(),
            dispatcher,
        }
    }

    /// Dispatches every file, then signals `done` to the aggregator
    ///
    /// The signal is sent even when a fatal error cuts the walk short, so
    /// the aggregator always gets to flush what it already received.
    pub async fn run(
        mut self,
        done: oneshot::Sender<()>,
    ) -> Result<Vec<DispatchReport>, SweepError> {
        let result = self.walk().await;

        // dropping the dispatcher closes the result channels
        drop(self);
        if done.send(()).is_err() {
            tracing::warn!("Aggregator stopped before the walk finished");
        }

        result
    }

    async fn walk(&mut self) -> Result<Vec<DispatchReport>, SweepError> {
        let files = list_input_files(&self.input_dir).await?;
        let total = files.len() as u64;
        tracing::info!(
            "Found {} input files in {}",
            total,
            self.input_dir.display()
        );

        let mut reports = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            let report = self.dispatcher.dispatch_file(file).await?;
            tracing::info!(
                "{}",
                render_progress("Overall progress", i as u64 + 1, total, PROGRESS_WIDTH)
            );
            tracing::info!(
                "{} done ({} probed, {} cached)",
                file.display(),
                report.probes_launched,
                report.cache_hits
            );
            reports.push(report);
        }

        Ok(reports)
    }
}
