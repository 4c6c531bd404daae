//! Filesystem pid locks for cross-process download exclusion.
//!
//! The lock file's existence is the lock; its content is the owning pid.
//! A lock whose pid is no longer a live (non-zombie) process is stale and
//! gets reclaimed. Everything else in the crate synchronizes in-process;
//! this is the only cross-process primitive.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Lock file path for a destination: `<dest>.lock`.
pub fn lock_path(dest: &Path) -> PathBuf {
    let mut o = dest.as_os_str().to_owned();
    o.push(".lock");
    PathBuf::from(o)
}

/// Attempt to acquire the pid lock at `path`. Returns true on success.
///
/// On contention the stored pid is checked: a dead owner's lock is removed
/// and acquisition retried exactly once (bounded, so two racing processes
/// cannot flap forever). Any other I/O error is treated as "locked".
pub fn acquire(path: &Path) -> bool {
    if try_create(path) {
        return true;
    }
    match read_owner(path) {
        Some(pid) if is_process_alive(pid) => {
            tracing::debug!(pid, lock = %path.display(), "lock held by live process");
            false
        }
        Some(pid) => {
            tracing::info!(pid, lock = %path.display(), "removing stale lock");
            if fs::remove_file(path).is_err() {
                return false;
            }
            // Single bounded retry; a loser of the re-create race backs off.
            try_create(path)
        }
        None => false,
    }
}

/// Release the lock at `path` if it is still held by this process.
/// Deleting only on a pid match prevents releasing a lock another process
/// acquired after a stale reclaim race.
pub fn release(path: &Path) {
    match read_owner(path) {
        Some(pid) if pid == std::process::id() => {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!(lock = %path.display(), "failed to remove lock: {}", e);
            } else {
                tracing::debug!(lock = %path.display(), "released lock");
            }
        }
        _ => {}
    }
}

fn try_create(path: &Path) -> bool {
    let created = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path);
    match created {
        Ok(mut f) => f.write_all(std::process::id().to_string().as_bytes()).is_ok(),
        Err(_) => false,
    }
}

fn read_owner(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok()
}

/// True if `pid` refers to a live, non-zombie process.
#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    let alive = unsafe { libc::kill(pid as libc::pid_t, 0) } == 0
        || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
    if !alive {
        return false;
    }
    !is_zombie(pid)
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    // No cheap liveness probe; err on the safe "locked" side.
    true
}

/// Linux: `/proc/<pid>/stat` state field is `Z` for zombies. The field
/// follows the last `)` since the comm field may itself contain parens.
#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    let stat = match fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(s) => s,
        Err(_) => return false,
    };
    stat.rsplit(')')
        .next()
        .and_then(|rest| rest.split_whitespace().next())
        .map(|state| state == "Z")
        .unwrap_or(false)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    // Without procfs a zombie counts as alive, which keeps the lock held.
    false
}

/// RAII guard: releases the lock on drop so every exit path out of a
/// download (including errors) leaves no lock behind.
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        release(&self.path);
    }
}
