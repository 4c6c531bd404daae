//! Local content cache: maps (repo, revision, path, content hash) to a
//! stable on-disk location.
//!
//! Layout mirrors the remote repo under
//! `<cache_root>/<models|datasets>/<group>/<name>/...`, with a JSON
//! manifest of cached hashes and a revision manifest (resolved commit id)
//! under a `.hubfetch/` subdirectory. Files are promoted from a staging
//! dir by atomic rename; entries are replaced, never mutated in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::Result;
use crate::remote::{RemoteFileDescriptor, RepoId, RepoKind};

const META_DIR: &str = ".hubfetch";
const MANIFEST_FILE: &str = "manifest.json";
const REVISION_FILE: &str = "revision.json";

/// Staging directory name under the cache root, shared by all repos.
pub const STAGING_DIR_NAME: &str = "._tmp";

/// One cached file, keyed by repo-relative path in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    files: BTreeMap<String, CacheEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RevisionManifest {
    commit_sha: String,
}

/// Cache for one repository. Cheap to share by reference across snapshot
/// workers; manifest updates are serialized in-process. Cross-process
/// exclusion is the lock manager's job, per destination file.
pub struct ContentCache {
    root: PathBuf,
    staging: PathBuf,
    manifest_lock: Mutex<()>,
}

impl ContentCache {
    pub fn new(cache_root: &Path, kind: RepoKind, repo: &RepoId) -> Self {
        let root = cache_root
            .join(kind.cache_dir())
            .join(&repo.group)
            .join(&repo.name);
        let staging = cache_root
            .join(STAGING_DIR_NAME)
            .join(&repo.group)
            .join(&repo.name);
        Self {
            root,
            staging,
            manifest_lock: Mutex::new(()),
        }
    }

    /// Root directory files are promoted into.
    pub fn root_location(&self) -> &Path {
        &self.root
    }

    /// Staging directory for in-flight downloads of this repo.
    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Returns the cached path if a file with the descriptor's content hash
    /// is already present, letting the caller skip the network entirely.
    pub fn exists(&self, desc: &RemoteFileDescriptor) -> Option<PathBuf> {
        let expected = desc.sha256.as_deref()?;
        let _g = self.manifest_lock.lock().unwrap();
        let manifest = self.load_manifest();
        let entry = manifest.files.get(&desc.path)?;
        if entry.sha256 != expected {
            return None;
        }
        let path = self.root.join(&desc.path);
        path.exists().then_some(path)
    }

    /// Look up a cached file by path only, ignoring hashes. Used for
    /// offline lookups where freshness cannot be confirmed.
    pub fn get_file_by_path(&self, path: &str) -> Option<PathBuf> {
        let full = self.root.join(path);
        full.exists().then_some(full)
    }

    /// Promote a verified staged file into the cache and record its hash.
    /// The move is an atomic rename when staging and cache share a
    /// filesystem; otherwise a copy-then-rename keeps readers consistent.
    pub fn put(
        &self,
        desc: &RemoteFileDescriptor,
        staged: &Path,
        sha256: &str,
    ) -> Result<PathBuf> {
        let final_path = self.root.join(&desc.path);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        if fs::rename(staged, &final_path).is_err() {
            // Cross-filesystem staging: copy next to the destination, then
            // rename within the target filesystem.
            let tmp = moving_temp_path(&final_path);
            fs::copy(staged, &tmp)?;
            fs::rename(&tmp, &final_path)?;
            fs::remove_file(staged)?;
        }

        let _g = self.manifest_lock.lock().unwrap();
        let mut manifest = self.load_manifest();
        manifest.files.insert(
            desc.path.clone(),
            CacheEntry {
                sha256: sha256.to_string(),
                size: desc.size,
            },
        );
        self.store_manifest(&manifest)?;
        tracing::debug!(file = %final_path.display(), sha256, "promoted into cache");
        Ok(final_path)
    }

    /// Record the resolved commit id for the last snapshot, so repeated
    /// downloads of a moving branch are distinguishable from a pinned
    /// commit.
    pub fn save_revision(&self, commit_sha: &str) -> Result<()> {
        let meta_dir = self.root.join(META_DIR);
        fs::create_dir_all(&meta_dir)?;
        let data = serde_json::to_vec_pretty(&RevisionManifest {
            commit_sha: commit_sha.to_string(),
        })
        .expect("revision manifest serializes");
        write_atomic(&meta_dir.join(REVISION_FILE), &data)?;
        Ok(())
    }

    /// Resolved commit id of the last snapshot, if one was recorded.
    pub fn revision(&self) -> Option<String> {
        let data = fs::read(self.root.join(META_DIR).join(REVISION_FILE)).ok()?;
        let manifest: RevisionManifest = serde_json::from_slice(&data).ok()?;
        Some(manifest.commit_sha)
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(META_DIR).join(MANIFEST_FILE)
    }

    fn load_manifest(&self) -> Manifest {
        match fs::read(self.manifest_path()) {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_default(),
            Err(_) => Manifest::default(),
        }
    }

    fn store_manifest(&self, manifest: &Manifest) -> Result<()> {
        let path = self.manifest_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(manifest).expect("manifest serializes");
        write_atomic(&path, &data)
    }
}

/// Temp sibling for a cross-filesystem promotion. The suffix goes after
/// the full file name, so `weights.bin` and `weights.tar` in one directory
/// never collide on the same temp path.
fn moving_temp_path(dest: &Path) -> PathBuf {
    let mut o = dest.as_os_str().to_owned();
    o.push(".hubfetch-moving");
    PathBuf::from(o)
}

/// Write via temp sibling + rename so concurrent readers never observe a
/// half-written manifest.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
