//! Single-stream resumable fetcher for files below the parallel threshold.
//!
//! The destination file doubles as the resume state: its current length is
//! the resume offset. Bytes are fed to the streaming hash only while the
//! transfer is "clean" (first attempt, no pre-existing partial); any resume
//! or retry makes the live digest unreliable and the outcome `Unknown`.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicU64;

use super::request::ranged_get_append;
use crate::config::DownloadConfig;
use crate::error::TransferError;
use crate::integrity::DownloadOutcome;
use crate::retry::run_with_retry;

pub(crate) fn fetch_single(
    url: &str,
    headers: &[(String, String)],
    dest: &Path,
    file_size: u64,
    cfg: &DownloadConfig,
    progress: &AtomicU64,
) -> Result<DownloadOutcome, TransferError> {
    let mut hasher = Sha256::new();
    let mut clean = true;
    let mut first_attempt = true;

    run_with_retry(&cfg.retry, || {
        if !first_attempt {
            clean = false;
        }
        first_attempt = false;

        // Re-evaluated each attempt so a failed attempt resumes where the
        // bytes actually landed.
        let partial = fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
        if partial > 0 {
            // Resuming an interrupted download counts as a retry: the
            // existing bytes never went through this hasher.
            clean = false;
        }
        if partial >= file_size {
            return Ok(());
        }
        tracing::debug!(
            file = %dest.display(),
            partial,
            total = file_size,
            "downloading range"
        );
        let hash = if clean { Some(&mut hasher) } else { None };
        ranged_get_append(url, headers, dest, partial, file_size - 1, cfg, progress, hash)
    })?;

    if clean {
        Ok(DownloadOutcome::Verified(hex::encode(hasher.finalize())))
    } else {
        Ok(DownloadOutcome::Unknown)
    }
}
