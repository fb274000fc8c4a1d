//! Typed configuration, loaded once at startup from the environment and an
//! optional `.env` file.

use std::env;
use std::path::{Path, PathBuf};

use dotenv::dotenv;

/// Upstream request/partitioning constants, promoted to configuration
/// rather than left hardcoded.
#[derive(Debug, Clone)]
pub struct Config {
    /// Snapshot store file location.
    pub db_path: PathBuf,
    /// Upstream HTTP(S) proxy URL. Required to start a harvest.
    pub proxy_url: Option<String>,
    /// Max simultaneously admitted lengths (4 orderings each).
    pub max_concurrent_lengths: usize,
    /// Overlap fraction of `RECORDS_PER_PAGE` that triggers meet-in-the-middle.
    pub overlap_threshold: f64,
    /// Fetcher retry attempts per request.
    pub retry_attempts: u32,
    /// Fixed delay between fetcher retry attempts.
    pub retry_delay_ms: u64,
    /// Fetcher transport timeout.
    pub fetch_timeout_ms: u64,
}

pub const RECORDS_PER_PAGE: usize = 500;
pub const MIN_LENGTH: i32 = 1;
pub const MAX_LENGTH: i32 = 63;

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            proxy_url: None,
            max_concurrent_lengths: 10,
            overlap_threshold: 0.8,
            retry_attempts: 10,
            retry_delay_ms: 2_000,
            fetch_timeout_ms: 45_000,
        }
    }
}

impl Config {
    /// Load from environment, falling back to `.env`: a standard dotenv
    /// search plus an explicit repo-root `.env` fallback.
    pub fn from_env() -> Self {
        load_env();

        let mut config = Self::default();

        if let Ok(v) = env::var("DB_PATH") {
            if !v.trim().is_empty() {
                config.db_path = PathBuf::from(v);
            }
        }
        if let Ok(v) = env::var("DOMAINWATCH_PROXY_URL") {
            if !v.trim().is_empty() {
                config.proxy_url = Some(v);
            }
        }
        if let Ok(v) = env::var("DOMAINWATCH_MAX_CONCURRENT_LENGTHS") {
            if let Ok(parsed) = v.parse() {
                config.max_concurrent_lengths = parsed;
            }
        }
        if let Ok(v) = env::var("DOMAINWATCH_OVERLAP_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                config.overlap_threshold = parsed;
            }
        }
        if let Ok(v) = env::var("DOMAINWATCH_RETRY_ATTEMPTS") {
            if let Ok(parsed) = v.parse() {
                config.retry_attempts = parsed;
            }
        }
        if let Ok(v) = env::var("DOMAINWATCH_RETRY_DELAY_MS") {
            if let Ok(parsed) = v.parse() {
                config.retry_delay_ms = parsed;
            }
        }

        config
    }

    /// Overlap rows (a fraction of `RECORDS_PER_PAGE`) that constitutes
    /// meet-in-the-middle termination for a stream.
    pub fn overlap_trigger_count(&self) -> usize {
        (RECORDS_PER_PAGE as f64 * self.overlap_threshold).floor() as usize
    }
}

fn default_db_path() -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".domainwatch").join("domainwatch.duckdb")
}

fn load_env() {
    let _ = dotenv();

    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        let manifest_dir = Path::new(&manifest_dir);
        for candidate in [manifest_dir.join(".env"), manifest_dir.join("../.env")] {
            if candidate.exists() {
                let _ = dotenv::from_path(&candidate);
            }
        }
    }
}
