//! Storage traits and error types
//!
//! Reads and writes are split into two traits. Dispatchers only ever see a
//! [`ReadStore`]; the aggregator is the single owner of a [`Store`].

use crate::storage::{Namespace, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to the key-value namespaces
pub trait ReadStore {
    /// Looks up a key, returning `None` when it has never been written
    fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<String>>;

    /// Returns true when the URL already has a completion record
    fn is_cached(&self, url: &str) -> StoreResult<bool> {
        Ok(self.get(Namespace::UrlCache, url)?.is_some())
    }

    /// Counts the entries in a namespace
    fn count(&self, namespace: Namespace) -> StoreResult<u64>;

    /// Lists every file checkpoint, ordered by file path
    fn checkpoints(&self) -> StoreResult<Vec<(String, String)>>;

    /// Gets the most recent run
    fn latest_run(&self) -> StoreResult<Option<RunRecord>>;
}

/// Full read/write access, held by exactly one owner at a time
pub trait Store: ReadStore {
    /// Writes a value under a key
    ///
    /// The URL cache keeps the first value ever written for a key. File
    /// checkpoints are overwritten.
    fn put(&mut self, namespace: Namespace, key: &str, value: &str) -> StoreResult<()>;

    // ===== Run Management =====

    /// Creates a new sweep run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StoreResult<i64>;

    /// Marks a run as finished with the given status
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StoreResult<()>;
}
