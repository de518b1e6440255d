//! Storage module for persisting sweep results
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - The URL completion cache and per-file scan checkpoints
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{SqliteReader, SqliteStore};
pub use traits::{ReadStore, Store, StoreError, StoreResult};

use std::fmt;

/// The two independent key spaces kept in the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// URL -> latency (ms) of its first successful probe
    UrlCache,

    /// Input file path -> number of lines already scanned
    FileCheckpoints,
}

impl Namespace {
    /// Name of the table backing this namespace
    pub fn table(&self) -> &'static str {
        match self {
            Self::UrlCache => "url_cache",
            Self::FileCheckpoints => "file_checkpoints",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Represents a sweep run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a sweep run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
