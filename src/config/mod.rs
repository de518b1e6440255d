//! Configuration module for Probe-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use probe_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sweep.toml")).unwrap();
//! println!("Probing at {} req/s", config.probe.requests_per_second());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, InputConfig, OutputConfig, ProbeConfig};

// Re-export parser functions
pub use parser::{load_config, load_config_with_hash, parse_config};
