//! CLI command handlers. Each command is in its own file.

mod checksum;
mod file;
mod snapshot;

pub use checksum::run_checksum;
pub use file::run_file;
pub use snapshot::run_snapshot;

use anyhow::Result;
use hubfetch_core::config::{DownloadConfig, HubfetchConfig, LockPolicy};
use hubfetch_core::remote::HttpHub;
use std::time::Duration;

/// Auth token environment variable read by all hub commands.
const TOKEN_ENV: &str = "HUBFETCH_TOKEN";

pub(super) fn build_hub(cfg: &HubfetchConfig) -> Result<HttpHub> {
    let token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
    Ok(HttpHub::new(&cfg.endpoint, token)?)
}

pub(super) fn build_download_config(cfg: &HubfetchConfig, wait: bool) -> DownloadConfig {
    let mut dl = cfg.download_config();
    if wait {
        dl.lock_policy = LockPolicy::Wait(Duration::from_secs(cfg.lock_poll_secs));
    }
    dl
}
