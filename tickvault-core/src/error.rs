//! Structured error types for acquisition operations.
//!
//! Failures inside a per-URL or per-symbol task are logged and dropped by the
//! caller; these variants only decide whether a request is retried and how a
//! failure is reported.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    /// Transient transport failure (connect, timeout, 5xx, 429, ...).
    #[error("network error: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed listing, catalog or probe response.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid manifest {path}: {reason}")]
    InvalidManifest { path: String, reason: String },

    #[error("corrupt archive {url}: {reason}")]
    ArchiveCorruption { url: String, reason: String },

    #[error("archive url does not match the {asset_class} path template: {url}")]
    InvalidUrl { url: String, asset_class: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    /// Only transient network failures are eligible for another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::Network(_))
    }
}
