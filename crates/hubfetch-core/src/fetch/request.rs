//! One ranged HTTP GET appending to a file.
//!
//! Shared core of the single-stream and part fetchers: issue
//! `Range: bytes=<start>-<end>` (closed range), append response bytes to
//! the destination, update the shared progress counter, and optionally
//! feed the streaming hasher.

use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::DownloadConfig;
use crate::error::TransferError;
use crate::remote::trace_id;

pub(super) fn ranged_get_append(
    url: &str,
    headers: &[(String, String)],
    dest: &Path,
    range_start: u64,
    range_end: u64,
    cfg: &DownloadConfig,
    progress: &AtomicU64,
    mut hasher: Option<&mut Sha256>,
) -> Result<(), TransferError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dest)
        .map_err(TransferError::Storage)?;
    let write_error: RefCell<Option<std::io::Error>> = RefCell::new(None);

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(cfg.connect_timeout)?;
    // Low-speed timeout instead of a hard wall clock: abort only when
    // throughput stays below 1 KiB/s for the stall window.
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(cfg.stall_timeout)?;
    // Fail without invoking the write callback on >=400 responses, so an
    // error body is never appended to the partial file.
    easy.fail_on_error(true)?;
    easy.range(&format!("{}-{}", range_start, range_end))?;

    let mut list = curl::easy::List::new();
    for (k, v) in headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    list.append(&format!("X-Request-ID: {}", trace_id()))?;
    easy.http_headers(list)?;

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            if let Err(e) = file.write_all(data) {
                write_error.borrow_mut().replace(e);
                return Ok(0); // abort transfer
            }
            if let Some(h) = hasher.as_deref_mut() {
                h.update(data);
            }
            progress.fetch_add(data.len() as u64, Ordering::Relaxed);
            Ok(data.len())
        })?;
        transfer.perform()
    };

    if let Err(e) = perform_result {
        if e.is_write_error() {
            if let Some(io_err) = write_error.borrow_mut().take() {
                return Err(TransferError::Storage(io_err));
            }
        }
        if e.is_http_returned_error() {
            if let Ok(code) = easy.response_code() {
                if code != 0 {
                    return Err(TransferError::Http(code));
                }
            }
        }
        return Err(TransferError::Curl(e));
    }

    let code = easy.response_code()?;
    // 206 for honored ranges, 200 when the range covers the whole file.
    if !(200..300).contains(&code) {
        return Err(TransferError::Http(code));
    }
    Ok(())
}
