//! Merge completed part files into the final destination.
//!
//! Parts are always consumed in ascending offset order, whatever order
//! they finished downloading in. If the destination already exists (a
//! prior version readers may hold open), the merge writes a temporary
//! sibling and renames it over the destination only once complete, so no
//! reader ever observes a half-merged file.

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::parts::{part_path, Part};

const BUF_SIZE: usize = 64 * 1024;

/// Temporary sibling used when the destination already exists:
/// `.<name>.tmp` in the same directory.
fn merge_temp_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.tmp", name))
}

/// Concatenate part files into `dest` in ascending offset order, hashing
/// the merged bytes. Each part file is deleted after it is consumed.
/// Returns the whole-file SHA-256 as lowercase hex.
pub(crate) fn merge_parts(dest: &Path, parts: &[Part]) -> Result<String> {
    let mut ordered: Vec<Part> = parts.to_vec();
    ordered.sort_by_key(|p| p.start);

    let use_temp = dest.exists();
    let write_path = if use_temp {
        let tmp = merge_temp_path(dest);
        if tmp.exists() {
            fs::remove_file(&tmp)?;
        }
        tmp
    } else {
        dest.to_path_buf()
    };

    let mut hasher = Sha256::new();
    let mut out = File::create(&write_path)?;
    let mut buf = [0u8; BUF_SIZE];
    for part in &ordered {
        let path = part_path(dest, part);
        let mut f = File::open(&path)?;
        loop {
            let n = f.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
            hasher.update(&buf[..n]);
        }
        fs::remove_file(&path)?;
    }
    out.flush()?;
    drop(out);

    if use_temp {
        fs::rename(&write_path, dest)?;
    }
    Ok(hex::encode(hasher.finalize()))
}
