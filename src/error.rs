//! Typed errors at each subsystem seam; `anyhow` composes them at the
//! coordinator/CLI boundary, keeping `thiserror` types internally and
//! `anyhow::Result` in `main.rs`.

use thiserror::Error;

/// Outcome of one fetch attempt. `TokenExpired` and the overlap/
/// empty-page/no-token cases are *not* errors - they are normal stream
/// termination signals handled in `harvest::stream`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("token expired or partition exhausted (302)")]
    TokenExpired,
    #[error("blocked by upstream (status {0})")]
    Blocked(u16),
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),
}

impl FetchError {
    /// Transient transport/status errors are retried; `TokenExpired` is a
    /// terminal partition signal that must not be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::TokenExpired)
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("store error: {0}")]
    Store(#[from] duckdb::Error),
    #[error("staging file error: {0}")]
    Staging(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("store error: {0}")]
    Store(#[from] duckdb::Error),
    #[error("snapshot {0} not found")]
    SnapshotNotFound(i64),
    #[error("domain {0} not found")]
    DomainNotFound(i64),
    #[error("invalid decimal in store: {0}")]
    InvalidDecimal(String),
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("a harvest is already running")]
    AlreadyRunning,
    #[error("no proxy configured (DOMAINWATCH_PROXY_URL)")]
    MissingProxyConfig,
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Store(#[from] duckdb::Error),
}
