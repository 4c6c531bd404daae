//! Repository snapshot enumeration and batch download.
//!
//! Lists the full recursive tree at a pinned commit, filters it through
//! allow/ignore glob patterns, then fans the surviving files out to a
//! bounded worker pool. One failed file never aborts the batch; it lands
//! in the summary instead.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use crate::cache::ContentCache;
use crate::config::DownloadConfig;
use crate::error::Result;
use crate::fetch::{download_file, FetchStatus};
use crate::remote::{EntryKind, HubSource, RepoId, RepoKind, TreeEntry};

/// Hub-internal housekeeping files never worth materializing locally.
const EXCLUDED_FILES: &[&str] = &[".gitignore", ".gitattributes"];

/// What to snapshot and which subset of the tree to keep.
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    /// Branch, tag or commit id to pin the snapshot to.
    pub revision: String,
    /// Keep only paths matching at least one of these; empty keeps all.
    pub allow_patterns: Vec<String>,
    /// Drop paths matching any of these. Ignore wins over allow.
    pub ignore_patterns: Vec<String>,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            revision: "master".to_string(),
            allow_patterns: Vec::new(),
            ignore_patterns: Vec::new(),
        }
    }
}

/// Per-file tally of a snapshot run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Files fetched over the network this run.
    pub downloaded: usize,
    /// Files already present with a matching hash.
    pub cached: usize,
    /// Files held by another process and skipped under the lock policy.
    pub skipped: usize,
    /// Files that failed, as (repo path, error) pairs.
    pub failed: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn is_complete(&self) -> bool {
        self.skipped == 0 && self.failed.is_empty()
    }
}

/// Download a filtered snapshot of `repo` at `opts.revision`.
///
/// Returns the local snapshot root and the per-file tally. The revision
/// is resolved to a commit id up front so every page of the listing and
/// the recorded snapshot revision agree even if the branch moves
/// mid-run.
pub fn snapshot_download(
    hub: &dyn HubSource,
    repo: &RepoId,
    kind: RepoKind,
    opts: &SnapshotOptions,
    cache_root: &Path,
    cfg: &DownloadConfig,
) -> Result<(PathBuf, BatchSummary)> {
    let commit = hub.resolve_revision(repo, &opts.revision)?;
    tracing::info!(repo = %repo, revision = %opts.revision, commit = %commit, "snapshot");

    let mut entries = Vec::new();
    let mut page = 1;
    loop {
        let listing = hub.list_tree(repo, &commit, page)?;
        entries.extend(listing.entries);
        if !listing.truncated {
            break;
        }
        page += 1;
    }

    let allow = compile_patterns(&opts.allow_patterns);
    let ignore = compile_patterns(&opts.ignore_patterns);
    let files: Vec<TreeEntry> = entries
        .into_iter()
        .filter(|e| e.kind == EntryKind::Blob)
        .filter(|e| selects(&e.path, &allow, &ignore))
        .collect();
    tracing::debug!(repo = %repo, files = files.len(), "tree filtered");

    let cache = ContentCache::new(cache_root, kind, repo);
    let headers = hub.request_headers();

    let downloaded = AtomicUsize::new(0);
    let cached = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let failed: Mutex<Vec<(String, String)>> = Mutex::new(Vec::new());
    let queue: Mutex<VecDeque<TreeEntry>> = Mutex::new(files.iter().cloned().collect());
    thread::scope(|s| {
        // At least one worker even on a misconfigured zero.
        for _ in 0..cfg.max_workers.max(1).min(files.len().max(1)) {
            s.spawn(|| loop {
                let next = queue.lock().unwrap().pop_front();
                let Some(entry) = next else { break };
                let result = hub
                    .resolve_file(repo, &entry.path, &opts.revision)
                    .and_then(|desc| {
                        if cache.exists(&desc).is_some() {
                            cached.fetch_add(1, Ordering::Relaxed);
                            return Ok(None);
                        }
                        let url = hub.file_url(repo, &desc.path, &opts.revision);
                        download_file(&desc, &url, &headers, &cache, cfg).map(Some)
                    });
                match result {
                    Ok(Some(FetchStatus::Cached(_))) => {
                        downloaded.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Some(FetchStatus::Skipped)) => {
                        skipped.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(file = %entry.path, error = %e, "file failed");
                        failed.lock().unwrap().push((entry.path, e.to_string()));
                    }
                }
            });
        }
    });

    let summary = BatchSummary {
        downloaded: downloaded.into_inner(),
        cached: cached.into_inner(),
        skipped: skipped.into_inner(),
        failed: failed.into_inner().unwrap(),
    };
    if summary.is_complete() {
        cache.save_revision(&commit)?;
    }
    Ok((cache.root_location().to_path_buf(), summary))
}

/// Normalize and compile user glob patterns. A trailing `/` means "this
/// directory and everything under it".
fn compile_patterns(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|raw| {
            let mut p = raw.trim().to_string();
            if p.is_empty() {
                return None;
            }
            if p.ends_with('/') {
                p.push('*');
            }
            match glob::Pattern::new(&p) {
                Ok(pat) => Some(pat),
                Err(e) => {
                    tracing::warn!(pattern = %raw, error = %e, "ignoring bad pattern");
                    None
                }
            }
        })
        .collect()
}

fn selects(path: &str, allow: &[glob::Pattern], ignore: &[glob::Pattern]) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    if EXCLUDED_FILES.contains(&name) {
        return false;
    }
    if ignore.iter().any(|p| p.matches(path)) {
        return false;
    }
    allow.is_empty() || allow.iter().any(|p| p.matches(path))
}
