//! Integration tests: parallel part download, part resume and merge.

mod common;

use sha2::{Digest, Sha256};
use std::fs;
use std::time::Duration;

use hubfetch_core::cache::ContentCache;
use hubfetch_core::config::DownloadConfig;
use hubfetch_core::fetch::{download_file, FetchStatus};
use hubfetch_core::parts::{part_path, plan_parts};
use hubfetch_core::remote::{EntryKind, RemoteFileDescriptor, RepoId, RepoKind};
use hubfetch_core::retry::RetryPolicy;
use tempfile::tempdir;

use common::range_server;

const PART_SIZE: u64 = 64 * 1024;

fn parallel_config() -> DownloadConfig {
    DownloadConfig {
        parallel_threshold: PART_SIZE,
        parallelism: 4,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        },
        ..DownloadConfig::default()
    }
}

fn test_cache(root: &std::path::Path) -> ContentCache {
    ContentCache::new(root, RepoKind::Model, &RepoId::parse("demo/resnet50"))
}

fn descriptor(body: &[u8]) -> RemoteFileDescriptor {
    RemoteFileDescriptor {
        path: "weights.bin".to_string(),
        size: body.len() as u64,
        sha256: Some(hex::encode(Sha256::digest(body))),
        kind: EntryKind::Blob,
    }
}

#[test]
fn large_file_is_fetched_in_parts_and_merged() {
    // 4 * PART_SIZE plus a short tail part.
    let body: Vec<u8> = (0u8..199).cycle().take(4 * PART_SIZE as usize + 500).collect();
    let server = range_server::start(body.clone());

    let cache_root = tempdir().unwrap();
    let cache = test_cache(cache_root.path());
    let desc = descriptor(&body);

    let status = download_file(&desc, &server.url, &[], &cache, &parallel_config()).unwrap();
    let FetchStatus::Cached(path) = status else {
        panic!("expected Cached");
    };
    assert_eq!(fs::read(&path).unwrap(), body);
    assert_eq!(server.get_count(), 5);

    let mut ranges = server.requested_ranges();
    ranges.sort_unstable();
    let expected: Vec<(u64, u64)> = plan_parts(body.len() as u64, PART_SIZE)
        .iter()
        .map(|p| (p.start, p.end))
        .collect();
    assert_eq!(ranges, expected);

    // Part files and the staged file are gone after promotion.
    let leftovers: Vec<_> = fs::read_dir(cache.staging_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert!(leftovers.is_empty(), "staging not empty: {leftovers:?}");
}

#[test]
fn completed_and_partial_parts_are_resumed() {
    let body: Vec<u8> = (0u8..251).cycle().take(3 * PART_SIZE as usize).collect();
    let server = range_server::start(body.clone());

    let cache_root = tempdir().unwrap();
    let cache = test_cache(cache_root.path());
    let desc = descriptor(&body);

    let parts = plan_parts(body.len() as u64, PART_SIZE);
    assert_eq!(parts.len(), 3);
    let staged = cache.staging_dir().join("weights.bin");
    fs::create_dir_all(staged.parent().unwrap()).unwrap();
    // Part 0 fully present, part 1 half present, part 2 absent.
    fs::write(
        part_path(&staged, &parts[0]),
        &body[parts[0].start as usize..=parts[0].end as usize],
    )
    .unwrap();
    fs::write(
        part_path(&staged, &parts[1]),
        &body[parts[1].start as usize..parts[1].start as usize + 100],
    )
    .unwrap();

    let status = download_file(&desc, &server.url, &[], &cache, &parallel_config()).unwrap();
    let FetchStatus::Cached(path) = status else {
        panic!("expected Cached");
    };
    assert_eq!(fs::read(&path).unwrap(), body);
    assert_eq!(server.get_count(), 2, "complete part must not be refetched");

    let mut ranges = server.requested_ranges();
    ranges.sort_unstable();
    assert_eq!(
        ranges,
        vec![
            (parts[1].start + 100, parts[1].end),
            (parts[2].start, parts[2].end),
        ]
    );
}
