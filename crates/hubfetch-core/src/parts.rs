//! Part math for parallel downloads.
//!
//! A part is a closed byte range `[start, end]` (inclusive both ends),
//! matching the wire format `Range: bytes=start-end` and the on-disk part
//! file naming `<base>_<start>_<end>`.

use std::path::{Path, PathBuf};

/// One contiguous byte range of a large file, downloaded independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (inclusive).
    pub end: u64,
}

impl Part {
    /// Length of this part in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// On-disk path for a part file: `<base>_<start>_<end>`.
pub fn part_path(base: &Path, part: &Part) -> PathBuf {
    let mut o = base.as_os_str().to_owned();
    o.push(format!("_{}_{}", part.start, part.end));
    PathBuf::from(o)
}

/// Split `[0, total_size)` into fixed-size parts; the last part is shorter.
/// Returns an empty plan when `total_size` or `part_size` is 0.
pub fn plan_parts(total_size: u64, part_size: u64) -> Vec<Part> {
    if total_size == 0 || part_size == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut start = 0u64;
    while start < total_size {
        let end = (start + part_size - 1).min(total_size - 1);
        out.push(Part { start, end });
        start = end + 1;
    }
    out
}
