//! Error taxonomy for fetch and cache operations.
//!
//! `TransferError` covers a single HTTP transfer attempt and is kept separate
//! so the retry layer can classify it before it is folded into `HubError`.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, HubError>;

/// Top-level error for single-file and snapshot downloads.
#[derive(Debug, Error)]
pub enum HubError {
    /// Another process holds the lock for this destination. Not fatal; the
    /// caller decides whether to wait or skip per `LockPolicy`.
    #[error("destination is locked by another process")]
    LockContention,

    /// A transfer failed after exhausting its retry budget.
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// Content hash mismatch after best-effort re-verification. The file has
    /// been deleted by the time this error is returned.
    #[error("integrity check failed for {path}: expected sha256 {expected}, actual {actual}")]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Caller passed a repository type other than model/dataset.
    #[error("invalid repo type: {0}, only model and dataset are supported")]
    InvalidRepoType(String),

    /// The remote repository or file does not exist.
    #[error("{path} does not exist in {repo}")]
    NotExist { repo: String, path: String },

    /// Malformed or unexpected metadata-service response.
    #[error("metadata response: {0}")]
    Metadata(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Error from a single transfer attempt (curl failure, HTTP status, or
/// local write failure). Classified by `retry::classify` to decide backoff.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error(transparent)]
    Curl(#[from] curl::Error),

    /// HTTP response outside the 2xx range.
    #[error("HTTP {0}")]
    Http(u32),

    /// Disk write failed (e.g. disk full, permission denied). Not retried.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
}
