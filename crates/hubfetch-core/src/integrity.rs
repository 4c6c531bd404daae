//! SHA-256 content verification.
//!
//! Two paths: a streaming digest fed while bytes are written (avoids a
//! second read of large files), and a whole-file re-hash used as fallback.
//! Any retry or resume invalidates the streaming digest, because bytes
//! before the retry point were hashed from a possibly-discarded attempt.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{HubError, Result};

const BUF_SIZE: usize = 64 * 1024;

/// Digest produced by a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Hash computed live during this transfer; no retry or resume occurred.
    Verified(String),
    /// A retry or resumed partial happened; the live hash is unreliable and
    /// a whole-file re-hash is required for verification.
    Unknown,
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
/// Reads in fixed-size blocks to keep memory bounded on large files.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Verify `path` against `expected`.
///
/// A live digest that matches settles it without re-reading the file. On a
/// live mismatch (or an `Unknown` outcome) the file is re-hashed from disk;
/// if that also mismatches, the file is deleted and `Integrity` returned.
pub fn verify(path: &Path, expected: &str, outcome: &DownloadOutcome) -> Result<()> {
    if let DownloadOutcome::Verified(digest) = outcome {
        if digest == expected {
            return Ok(());
        }
        tracing::warn!(
            file = %path.display(),
            "mismatched real-time digest, falling back to whole-file hash"
        );
    }
    let actual = sha256_path(path)?;
    if actual == expected {
        return Ok(());
    }
    // Best effort: a failed delete must not mask the integrity error.
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(file = %path.display(), "failed to remove corrupt file: {}", e);
    }
    tracing::error!(
        file = %path.display(),
        expected,
        actual,
        "integrity check failed"
    );
    Err(HubError::Integrity {
        path: path.to_path_buf(),
        expected: expected.to_string(),
        actual,
    })
}
