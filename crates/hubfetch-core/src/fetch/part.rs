//! One part of a parallel download: ranged GET into `<base>_<start>_<end>`.
//!
//! Resumable the same way as the single-stream path: the part file's length
//! is the resume offset within the part. No hashing here; the merge step
//! computes the whole-file digest.

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicU64;

use super::request::ranged_get_append;
use crate::config::DownloadConfig;
use crate::error::TransferError;
use crate::parts::{part_path, Part};
use crate::retry::run_with_retry;

pub(crate) fn fetch_part(
    url: &str,
    headers: &[(String, String)],
    base: &Path,
    part: &Part,
    cfg: &DownloadConfig,
    progress: &AtomicU64,
) -> Result<(), TransferError> {
    let path = part_path(base, part);
    run_with_retry(&cfg.retry, || {
        let partial = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let start = part.start + partial;
        if start > part.end {
            // Part already complete from a previous run.
            return Ok(());
        }
        tracing::debug!(
            part = %path.display(),
            start,
            end = part.end,
            "downloading part range"
        );
        ranged_get_append(url, headers, &path, start, part.end, cfg, progress, None)
    })
}
