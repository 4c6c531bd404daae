//! Configuration: an injectable `DownloadConfig` used by the orchestrator
//! and enumerator, plus the on-disk TOML form loaded from
//! `~/.config/hubfetch/config.toml`. Tests construct `DownloadConfig`
//! directly so nothing on the hot path reads ambient process state.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// What to do when another process holds the download lock for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    /// Skip the file and report it as not fetched.
    Skip,
    /// Poll at the given interval until the lock is free.
    Wait(Duration),
}

/// All tunables consumed by the download orchestrator and the snapshot
/// enumerator. Constructed from `HubfetchConfig` or directly in tests.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Files larger than this are split into parts of exactly this size.
    pub parallel_threshold: u64,
    /// Worker threads for parts within one file; 1 disables parallel fetch.
    pub parallelism: usize,
    /// Worker threads across files in a snapshot.
    pub max_workers: usize,
    /// Retry/backoff policy shared by all transfers.
    pub retry: RetryPolicy,
    /// Behavior on lock contention.
    pub lock_policy: LockPolicy,
    /// TCP connect timeout per request.
    pub connect_timeout: Duration,
    /// Abort a transfer whose throughput stays below 1 KiB/s this long.
    pub stall_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 160 * 1024 * 1024,
            parallelism: 6,
            max_workers: 3,
            retry: RetryPolicy::default(),
            lock_policy: LockPolicy::Skip,
            connect_timeout: Duration::from_secs(30),
            stall_timeout: Duration::from_secs(60),
        }
    }
}

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per transfer (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs_f64(self.base_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/hubfetch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubfetchConfig {
    /// Hub endpoint base URL (scheme + host).
    pub endpoint: String,
    /// Parallel-download threshold and part size, in MiB.
    pub parallel_threshold_mb: u64,
    /// Worker threads for parts within one large file.
    pub parallelism: usize,
    /// Worker threads across files in a snapshot download.
    pub max_workers: usize,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Wait for a competing process's lock instead of skipping the file.
    #[serde(default)]
    pub wait_for_locks: bool,
    /// Poll interval in seconds when waiting for locks.
    #[serde(default = "default_lock_poll_secs")]
    pub lock_poll_secs: u64,
}

fn default_lock_poll_secs() -> u64 {
    10
}

impl Default for HubfetchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://git.example.com".to_string(),
            parallel_threshold_mb: 160,
            parallelism: 6,
            max_workers: 3,
            retry: None,
            wait_for_locks: false,
            lock_poll_secs: default_lock_poll_secs(),
        }
    }
}

impl HubfetchConfig {
    /// Convert the file form into the struct the engine consumes.
    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            parallel_threshold: self.parallel_threshold_mb * 1024 * 1024,
            parallelism: self.parallelism,
            max_workers: self.max_workers,
            retry: self
                .retry
                .as_ref()
                .map(RetryConfig::to_policy)
                .unwrap_or_default(),
            lock_policy: if self.wait_for_locks {
                LockPolicy::Wait(Duration::from_secs(self.lock_poll_secs))
            } else {
                LockPolicy::Skip
            },
            ..DownloadConfig::default()
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hubfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Default cache root: `~/.cache/hubfetch/hub`.
pub fn default_cache_root() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hubfetch")?;
    Ok(xdg_dirs.get_cache_home().join("hub"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HubfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HubfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HubfetchConfig = toml::from_str(&data)?;
    Ok(cfg)
}
