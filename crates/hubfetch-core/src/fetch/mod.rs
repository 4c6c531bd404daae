//! Download orchestration: lock, fetch (single-stream or parallel parts),
//! verify, promote into the cache.
//!
//! Per-file state machine: Idle → LockAcquired → Fetching → Verifying →
//! Cached | Failed | Skipped. The pid lock is held for the whole
//! fetch/verify window and released on every exit path via `LockGuard`.

mod merge;
mod part;
mod request;
mod single;

use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;

use crate::cache::ContentCache;
use crate::config::{DownloadConfig, LockPolicy};
use crate::error::{HubError, Result, TransferError};
use crate::integrity::{self, DownloadOutcome};
use crate::lock::{self, LockGuard};
use crate::parts::plan_parts;
use crate::remote::{EntryKind, HubSource, RemoteFileDescriptor, RepoId, RepoKind};

/// Result of a single-file download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// File is verified and present in the cache at this path.
    Cached(PathBuf),
    /// Another process holds the lock and policy is `Skip`; not fetched.
    Skipped,
}

/// Download one file described by `desc` from `url` into the cache.
///
/// Checks the cache first (no network on a hash hit), acquires the pid
/// lock for the staged destination, fetches with the strategy chosen by
/// size, verifies, and promotes.
pub fn download_file(
    desc: &RemoteFileDescriptor,
    url: &str,
    headers: &[(String, String)],
    cache: &ContentCache,
    cfg: &DownloadConfig,
) -> Result<FetchStatus> {
    if let Some(path) = cache.exists(desc) {
        tracing::debug!(
            file = %desc.path,
            "already in cache with identical hash, skipping download"
        );
        return Ok(FetchStatus::Cached(path));
    }

    let staged = cache.staging_dir().join(&desc.path);
    if let Some(parent) = staged.parent() {
        fs::create_dir_all(parent)?;
    }

    let lock_path = lock::lock_path(&staged);
    loop {
        if lock::acquire(&lock_path) {
            break;
        }
        match cfg.lock_policy {
            LockPolicy::Skip => {
                tracing::info!(file = %desc.path, "skipping, active lock held elsewhere");
                return Ok(FetchStatus::Skipped);
            }
            LockPolicy::Wait(interval) => {
                tracing::warn!(file = %desc.path, "waiting on active lock");
                thread::sleep(interval);
            }
        }
    }
    let _guard = LockGuard::new(lock_path);

    let progress = AtomicU64::new(0);
    let outcome = if desc.size == 0 {
        // No request for empty files; an empty staged file is already
        // complete and its digest is known.
        File::create(&staged)?;
        DownloadOutcome::Verified(hex::encode(Sha256::new().finalize()))
    } else if desc.size > cfg.parallel_threshold && cfg.parallelism > 1 {
        parallel_fetch(url, headers, &staged, desc.size, cfg, &progress)?
    } else {
        single::fetch_single(url, headers, &staged, desc.size, cfg, &progress)?
    };
    tracing::debug!(
        file = %desc.path,
        bytes = progress.load(Ordering::Relaxed),
        "transfer complete"
    );

    let sha256 = match &desc.sha256 {
        Some(expected) => {
            integrity::verify(&staged, expected, &outcome)?;
            expected.clone()
        }
        // First fetch of a file the hub has no hash for: the computed
        // digest becomes authoritative.
        None => match outcome {
            DownloadOutcome::Verified(digest) => digest,
            DownloadOutcome::Unknown => integrity::sha256_path(&staged)?,
        },
    };

    let final_path = cache.put(desc, &staged, &sha256)?;
    tracing::info!(file = %desc.path, path = %final_path.display(), "downloaded");
    Ok(FetchStatus::Cached(final_path))
}

/// Fetch a large file as fixed-size parts on a bounded worker pool, then
/// merge. The merge-time digest is always trustworthy, so the outcome is
/// `Verified` even when individual parts retried.
fn parallel_fetch(
    url: &str,
    headers: &[(String, String)],
    staged: &Path,
    size: u64,
    cfg: &DownloadConfig,
    progress: &AtomicU64,
) -> Result<DownloadOutcome> {
    let parts = plan_parts(size, cfg.parallel_threshold);
    tracing::debug!(
        file = %staged.display(),
        parts = parts.len(),
        workers = cfg.parallelism,
        "parallel fetch"
    );

    let queue: Mutex<VecDeque<_>> = Mutex::new(parts.iter().copied().collect());
    let failure: Mutex<Option<TransferError>> = Mutex::new(None);
    thread::scope(|s| {
        for _ in 0..cfg.parallelism.min(parts.len()) {
            s.spawn(|| loop {
                let next = queue.lock().unwrap().pop_front();
                let Some(p) = next else { break };
                if let Err(e) = part::fetch_part(url, headers, staged, &p, cfg, progress) {
                    // Abort the rest of this file; completed and partial
                    // part files stay on disk for a later resume.
                    queue.lock().unwrap().clear();
                    failure.lock().unwrap().get_or_insert(e);
                    break;
                }
            });
        }
    });
    if let Some(e) = failure.into_inner().unwrap() {
        return Err(e.into());
    }

    let digest = merge::merge_parts(staged, &parts)?;
    Ok(DownloadOutcome::Verified(digest))
}

/// Resolve and download a single repo file, returning its cached path.
///
/// The single-file analogue of a snapshot: metadata comes from the hub
/// boundary, the cache short-circuits repeat fetches, and lock contention
/// under the `Skip` policy surfaces as `LockContention`.
pub fn fetch_file(
    hub: &dyn HubSource,
    repo: &RepoId,
    kind: RepoKind,
    path: &str,
    revision: &str,
    cache_root: &Path,
    cfg: &DownloadConfig,
) -> Result<PathBuf> {
    let cache = ContentCache::new(cache_root, kind, repo);
    let desc = hub.resolve_file(repo, path, revision)?;
    if desc.kind != EntryKind::Blob {
        return Err(HubError::NotExist {
            repo: repo.to_string(),
            path: path.to_string(),
        });
    }
    let url = hub.file_url(repo, &desc.path, revision);
    let headers = hub.request_headers();
    match download_file(&desc, &url, &headers, &cache, cfg)? {
        FetchStatus::Cached(p) => Ok(p),
        FetchStatus::Skipped => Err(HubError::LockContention),
    }
}
