//! Remote repository metadata boundary.
//!
//! The download engine consumes this trait; it never implements tree
//! listing or revision resolution itself. `HttpHub` is the stock
//! implementation against a gitea-style hub API. Responses are strongly
//! typed per endpoint, with explicit optional fields.

mod http;

pub use http::HttpHub;

use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{HubError, Result};

/// Default namespace for repo ids given without a `group/` prefix.
pub const DEFAULT_GROUP: &str = "demo";

/// `group/name` repository identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub group: String,
    pub name: String,
}

impl RepoId {
    /// Parse `"group/name"`; a bare name falls into the default group.
    pub fn parse(s: &str) -> Self {
        match s.split_once('/') {
            Some((group, name)) => Self {
                group: group.trim().to_string(),
                name: name.trim().to_string(),
            },
            None => Self {
                group: DEFAULT_GROUP.to_string(),
                name: s.trim().to_string(),
            },
        }
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

/// Repository kind; decides the cache subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoKind {
    Model,
    Dataset,
}

impl RepoKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "model" => Ok(RepoKind::Model),
            "dataset" => Ok(RepoKind::Dataset),
            other => Err(HubError::InvalidRepoType(other.to_string())),
        }
    }

    /// Cache subdirectory for this kind.
    pub fn cache_dir(&self) -> &'static str {
        match self {
            RepoKind::Model => "models",
            RepoKind::Dataset => "datasets",
        }
    }
}

/// Entry kind in a repository tree. Trees are skipped during snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    #[serde(other)]
    Other,
}

/// Metadata for one file at a repository revision. Immutable once produced.
#[derive(Debug, Clone)]
pub struct RemoteFileDescriptor {
    /// Repo-relative path.
    pub path: String,
    /// Size in bytes; may be 0.
    pub size: u64,
    /// Expected content hash, when the hub knows it.
    pub sha256: Option<String>,
    pub kind: EntryKind,
}

/// One entry of a paginated tree listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

/// One page of a tree listing. `truncated == false` ends pagination.
#[derive(Debug, Clone)]
pub struct TreePage {
    pub entries: Vec<TreeEntry>,
    pub truncated: bool,
}

/// Boundary to the repository metadata service.
///
/// Implementations must be usable from multiple snapshot worker threads.
pub trait HubSource: Sync {
    /// Resolve one file's metadata (size and content hash) at a revision.
    fn resolve_file(
        &self,
        repo: &RepoId,
        path: &str,
        revision: &str,
    ) -> Result<RemoteFileDescriptor>;

    /// Fetch one page (1-based) of the recursive tree listing.
    fn list_tree(&self, repo: &RepoId, revision: &str, page: u32) -> Result<TreePage>;

    /// Resolve a named revision (tag/branch) to a commit id. A revision
    /// that is already a commit id comes back unchanged.
    fn resolve_revision(&self, repo: &RepoId, revision: &str) -> Result<String>;

    /// Direct download URL for one file at a revision.
    fn file_url(&self, repo: &RepoId, path: &str, revision: &str) -> String;

    /// Headers to attach to download requests (auth etc.).
    fn request_headers(&self) -> Vec<(String, String)>;
}

/// Per-request trace id for observability: 32 hex chars, unique enough to
/// correlate one request's log lines across client and server.
pub(crate) fn trace_id() -> String {
    use sha2::{Digest, Sha256};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut hasher = Sha256::new();
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hex::encode(hasher.finalize())[..32].to_string()
}
