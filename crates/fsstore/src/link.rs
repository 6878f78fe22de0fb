//! Object links: where an object lives on disk.
//!
//! Layout for a shard prefix length of 2:
//! ```text
//! {base_dir}/
//! └── {bucket}/
//!     ├── ab/
//!     │   └── cde123.../
//!     │       └── abcde123...   # object bytes, named by the full id
//!     └── 12/
//!         └── 3456789.../
//!             └── 123456789...
//! ```
//!
//! The file is named by the full content id so that a directory walk can
//! recover ids from file names alone, whatever shard length wrote them.

use std::path::{Path, PathBuf};

use crate::digest::ContentId;

/// Resolve the object link for `cid`. Pure: no filesystem access.
///
/// Empty shard segments (shard length 0, or a shard length covering the whole
/// id) are left out rather than producing empty path components.
pub fn resolve(cid: &ContentId, bucket: &str, base_dir: &Path, shard_len: usize) -> PathBuf {
    let (parent, child) = cid.split_shard(shard_len);
    let mut link = bucket_dir(base_dir, bucket);
    if !parent.is_empty() {
        link.push(parent);
    }
    if !child.is_empty() {
        link.push(child);
    }
    link.push(cid.as_str());
    link
}

/// Root of a bucket's object tree.
pub fn bucket_dir(base_dir: &Path, bucket: &str) -> PathBuf {
    base_dir.join(bucket)
}
