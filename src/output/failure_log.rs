//! Size-rotated log of URLs that exhausted their retries
//!
//! One URL per line, in the order the failures reached the aggregator.
//! When the next line would push the active file past its size ceiling, the
//! file is renamed to `<stem>-<timestamp>.<ext>` and a fresh one is started.

use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Append-only failure log with size-based rotation
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    max_bytes: u64,
    file: File,
    size: u64,
}

impl FailureLog {
    /// Opens the log for appending, rotating once it exceeds `max_size_mb`
    ///
    /// Missing parent directories are created.
    pub fn open(path: &Path, max_size_mb: u64) -> io::Result<Self> {
        Self::with_max_bytes(path, max_size_mb.saturating_mul(BYTES_PER_MB))
    }

    /// Same as [`FailureLog::open`] with the ceiling given in bytes
    pub fn with_max_bytes(path: &Path, max_bytes: u64) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = open_append(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            file,
            size,
        })
    }

    /// Appends one line, rotating first if the line would not fit
    pub fn append(&mut self, line: &str) -> io::Result<()> {
        let len = line.len() as u64 + 1;
        if self.size > 0 && self.size + len > self.max_bytes {
            self.rotate()?;
        }

        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        self.size += len;
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        let backup = self.backup_path(Utc::now());
        fs::rename(&self.path, &backup)?;
        self.file = open_append(&self.path)?;
        self.size = 0;
        tracing::info!("Rotated failure log to {}", backup.display());
        Ok(())
    }

    /// Builds a free backup file name for a rotation happening at `at`
    fn backup_path(&self, at: DateTime<Utc>) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let stamp = at.format("%Y-%m-%dT%H-%M-%S%.3f");

        let mut candidate = self.path.with_file_name(format!("{stem}-{stamp}{ext}"));
        let mut n = 1;
        while candidate.exists() {
            candidate = self
                .path
                .with_file_name(format!("{stem}-{stamp}-{n}{ext}"));
            n += 1;
        }
        candidate
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
