//! Integration tests: snapshot enumeration, filtering and batch download
//! through an in-memory hub backed by local range servers.

mod common;

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use hubfetch_core::cache::ContentCache;
use hubfetch_core::config::DownloadConfig;
use hubfetch_core::remote::{
    EntryKind, HubSource, RemoteFileDescriptor, RepoId, RepoKind, TreeEntry, TreePage,
};
use hubfetch_core::retry::RetryPolicy;
use hubfetch_core::snapshot::{snapshot_download, SnapshotOptions};
use hubfetch_core::{HubError, Result};
use tempfile::tempdir;

use common::range_server::{self, RangeServer, RangeServerOptions};

const COMMIT: &str = "8f14e45fceea167a5a36dedd4bea2543";

struct Fixture {
    body: Vec<u8>,
    server: RangeServer,
}

/// In-memory hub: each file is served by its own local range server.
struct TestHub {
    files: HashMap<String, Fixture>,
}

impl TestHub {
    fn new(files: Vec<(&str, Vec<u8>)>) -> Self {
        let files = files
            .into_iter()
            .map(|(path, body)| {
                let server = range_server::start(body.clone());
                (path.to_string(), Fixture { body, server })
            })
            .collect();
        Self { files }
    }

    fn with_broken_file(mut self, path: &str, body: Vec<u8>) -> Self {
        let server = range_server::start_with_options(
            body.clone(),
            RangeServerOptions {
                fail_first_gets: usize::MAX,
            },
        );
        self.files
            .insert(path.to_string(), Fixture { body, server });
        self
    }

    fn total_gets(&self) -> usize {
        self.files.values().map(|f| f.server.get_count()).sum()
    }
}

impl HubSource for TestHub {
    fn resolve_file(
        &self,
        repo: &RepoId,
        path: &str,
        _revision: &str,
    ) -> Result<RemoteFileDescriptor> {
        let fixture = self.files.get(path).ok_or_else(|| HubError::NotExist {
            repo: repo.to_string(),
            path: path.to_string(),
        })?;
        Ok(RemoteFileDescriptor {
            path: path.to_string(),
            size: fixture.body.len() as u64,
            sha256: Some(hex::encode(Sha256::digest(&fixture.body))),
            kind: EntryKind::Blob,
        })
    }

    fn list_tree(&self, _repo: &RepoId, _revision: &str, _page: u32) -> Result<TreePage> {
        let mut entries: Vec<TreeEntry> = self
            .files
            .iter()
            .map(|(path, f)| TreeEntry {
                path: path.clone(),
                size: f.body.len() as u64,
                kind: EntryKind::Blob,
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        // Entries a snapshot must never materialize.
        entries.push(TreeEntry {
            path: ".gitignore".to_string(),
            size: 12,
            kind: EntryKind::Blob,
        });
        entries.push(TreeEntry {
            path: "subdir".to_string(),
            size: 0,
            kind: EntryKind::Tree,
        });
        Ok(TreePage {
            entries,
            truncated: false,
        })
    }

    fn resolve_revision(&self, _repo: &RepoId, _revision: &str) -> Result<String> {
        Ok(COMMIT.to_string())
    }

    fn file_url(&self, _repo: &RepoId, path: &str, _revision: &str) -> String {
        self.files[path].server.url.clone()
    }

    fn request_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

fn test_config() -> DownloadConfig {
    DownloadConfig {
        max_workers: 2,
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        },
        ..DownloadConfig::default()
    }
}

fn repo() -> RepoId {
    RepoId::parse("demo/bert-base")
}

#[test]
fn snapshot_downloads_all_blobs() {
    let hub = TestHub::new(vec![
        ("config.json", b"{\"layers\": 12}".to_vec()),
        ("weights/part-0.bin", (0u8..77).cycle().take(4096).collect()),
    ]);
    let cache_root = tempdir().unwrap();

    let (root, summary) = snapshot_download(
        &hub,
        &repo(),
        RepoKind::Model,
        &SnapshotOptions::default(),
        cache_root.path(),
        &test_config(),
    )
    .unwrap();

    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.cached, 0);
    assert!(summary.is_complete());
    assert_eq!(
        fs::read(root.join("config.json")).unwrap(),
        b"{\"layers\": 12}"
    );
    assert!(root.join("weights/part-0.bin").exists());
    assert!(!root.join(".gitignore").exists());

    let cache = ContentCache::new(cache_root.path(), RepoKind::Model, &repo());
    assert_eq!(cache.revision().as_deref(), Some(COMMIT));
}

#[test]
fn second_snapshot_is_fully_cached() {
    let hub = TestHub::new(vec![
        ("a.txt", b"aaaa".to_vec()),
        ("b.txt", b"bbbb".to_vec()),
    ]);
    let cache_root = tempdir().unwrap();
    let cfg = test_config();

    let (_, first) = snapshot_download(
        &hub,
        &repo(),
        RepoKind::Model,
        &SnapshotOptions::default(),
        cache_root.path(),
        &cfg,
    )
    .unwrap();
    assert_eq!(first.downloaded, 2);
    let gets_after_first = hub.total_gets();

    let (_, second) = snapshot_download(
        &hub,
        &repo(),
        RepoKind::Model,
        &SnapshotOptions::default(),
        cache_root.path(),
        &cfg,
    )
    .unwrap();
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.cached, 2);
    assert_eq!(hub.total_gets(), gets_after_first);
}

#[test]
fn allow_and_ignore_patterns_limit_the_snapshot() {
    let hub = TestHub::new(vec![
        ("model.safetensors", b"tensors".to_vec()),
        ("config.json", b"{}".to_vec()),
        ("logs/run.txt", b"noise".to_vec()),
    ]);
    let cache_root = tempdir().unwrap();
    let opts = SnapshotOptions {
        allow_patterns: vec!["*.safetensors".to_string(), "*.json".to_string()],
        ignore_patterns: vec!["logs/".to_string()],
        ..SnapshotOptions::default()
    };

    let (root, summary) = snapshot_download(
        &hub,
        &repo(),
        RepoKind::Model,
        &opts,
        cache_root.path(),
        &test_config(),
    )
    .unwrap();

    assert_eq!(summary.downloaded, 2);
    assert!(root.join("model.safetensors").exists());
    assert!(root.join("config.json").exists());
    assert!(!root.join("logs/run.txt").exists());
}

#[test]
fn zero_worker_config_still_downloads() {
    let hub = TestHub::new(vec![("a.txt", b"aaaa".to_vec())]);
    let cache_root = tempdir().unwrap();
    let cfg = DownloadConfig {
        max_workers: 0,
        ..test_config()
    };

    let (root, summary) = snapshot_download(
        &hub,
        &repo(),
        RepoKind::Model,
        &SnapshotOptions::default(),
        cache_root.path(),
        &cfg,
    )
    .unwrap();

    assert_eq!(summary.downloaded, 1);
    assert!(root.join("a.txt").exists());
}

#[test]
fn one_failing_file_does_not_abort_the_batch() {
    let hub = TestHub::new(vec![("good.txt", b"fine".to_vec())])
        .with_broken_file("bad.bin", b"unreachable".to_vec());
    let cache_root = tempdir().unwrap();

    let (root, summary) = snapshot_download(
        &hub,
        &repo(),
        RepoKind::Model,
        &SnapshotOptions::default(),
        cache_root.path(),
        &test_config(),
    )
    .unwrap();

    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "bad.bin");
    assert!(!summary.is_complete());
    assert!(root.join("good.txt").exists());
    assert!(!root.join("bad.bin").exists());

    // An incomplete snapshot must not be recorded as the local revision.
    let cache = ContentCache::new(cache_root.path(), RepoKind::Model, &repo());
    assert_eq!(cache.revision(), None);
}
