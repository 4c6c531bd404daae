//! `hubfetch snapshot` command: download a filtered repository tree.

use anyhow::Result;
use hubfetch_core::config::{self, HubfetchConfig};
use hubfetch_core::remote::{RepoId, RepoKind};
use hubfetch_core::snapshot::{snapshot_download, SnapshotOptions};

use super::{build_download_config, build_hub};

pub fn run_snapshot(
    cfg: &HubfetchConfig,
    repo: &str,
    revision: &str,
    kind: &str,
    allow: Vec<String>,
    ignore: Vec<String>,
    wait: bool,
) -> Result<()> {
    let hub = build_hub(cfg)?;
    let repo = RepoId::parse(repo);
    let kind = RepoKind::parse(kind)?;
    let cache_root = config::default_cache_root()?;
    let dl = build_download_config(cfg, wait);
    let opts = SnapshotOptions {
        revision: revision.to_string(),
        allow_patterns: allow,
        ignore_patterns: ignore,
    };

    let (root, summary) = snapshot_download(&hub, &repo, kind, &opts, &cache_root, &dl)?;
    println!(
        "snapshot of {} at {}: {} downloaded, {} cached, {} skipped, {} failed",
        repo,
        root.display(),
        summary.downloaded,
        summary.cached,
        summary.skipped,
        summary.failed.len()
    );
    for (path, err) in &summary.failed {
        eprintln!("  failed: {path}: {err}");
    }
    if !summary.is_complete() {
        anyhow::bail!("snapshot incomplete");
    }
    Ok(())
}
