//! Output module for everything a sweep writes besides the database
//!
//! This module handles:
//! - The rotated log of URLs that could not be reached
//! - Human-readable progress lines

mod failure_log;
mod progress;

pub use failure_log::FailureLog;
pub use progress::render_progress;
