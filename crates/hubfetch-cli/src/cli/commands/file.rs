//! `hubfetch file` command: download one repository file.

use anyhow::Result;
use hubfetch_core::config::{self, HubfetchConfig};
use hubfetch_core::fetch;
use hubfetch_core::remote::{RepoId, RepoKind};

use super::{build_download_config, build_hub};

pub fn run_file(
    cfg: &HubfetchConfig,
    repo: &str,
    path: &str,
    revision: &str,
    kind: &str,
    wait: bool,
) -> Result<()> {
    let hub = build_hub(cfg)?;
    let repo = RepoId::parse(repo);
    let kind = RepoKind::parse(kind)?;
    let cache_root = config::default_cache_root()?;
    let dl = build_download_config(cfg, wait);

    let local = fetch::fetch_file(&hub, &repo, kind, path, revision, &cache_root, &dl)?;
    println!("{}", local.display());
    Ok(())
}
