//! Store configuration and its builder.
//!
//! A [`StoreConfig`] can only be produced by [`StoreConfigBuilder::build`],
//! so every store is constructed from a validated configuration.
//!
//! Defaults:
//! - base directory: `FSSTORE_DATA_DIR`, else `/data`
//! - bucket: `store`
//! - shard prefix length: 2
//! - digest: SHA-256
//! - debug: off

use std::env;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::digest::{ContentId, DigestAlgorithm};
use crate::error::StoreError;
use crate::link;

pub const ENV_DATA_DIR: &str = "FSSTORE_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "/data";
pub const DEFAULT_BUCKET: &str = "store";
pub const DEFAULT_SHARD_PREFIX_LEN: usize = 2;
pub const DEFAULT_DIR_MODE: u32 = 0o777;

/// Validated, immutable configuration for a [`FileObjectStore`](crate::FileObjectStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreConfig {
    base_dir: PathBuf,
    bucket: String,
    shard_prefix_len: usize,
    debug: bool,
    algorithm: DigestAlgorithm,
    dir_mode: u32,
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Shorthand for a config rooted at `base_dir` with every other default.
    pub fn at_path(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::builder().base_dir(base_dir).build()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn shard_prefix_len(&self) -> usize {
        self.shard_prefix_len
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Mode for directories the store creates (unix only; masked by umask).
    pub fn dir_mode(&self) -> u32 {
        self.dir_mode
    }

    /// Root of this store's bucket.
    pub fn bucket_dir(&self) -> PathBuf {
        link::bucket_dir(&self.base_dir, &self.bucket)
    }

    /// Object link for `cid` under this configuration.
    pub fn object_link(&self, cid: &ContentId) -> PathBuf {
        link::resolve(cid, &self.bucket, &self.base_dir, self.shard_prefix_len)
    }
}

/// Named-parameter construction for [`StoreConfig`].
#[derive(Debug, Clone)]
pub struct StoreConfigBuilder {
    base_dir: PathBuf,
    bucket: String,
    shard_prefix_len: usize,
    debug: bool,
    algorithm: DigestAlgorithm,
    dir_mode: u32,
}

/// Base directory from the environment, falling back to `/data`.
pub fn default_data_dir() -> PathBuf {
    env::var_os(ENV_DATA_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self {
            base_dir: default_data_dir(),
            bucket: DEFAULT_BUCKET.to_string(),
            shard_prefix_len: DEFAULT_SHARD_PREFIX_LEN,
            debug: false,
            algorithm: DigestAlgorithm::default(),
            dir_mode: DEFAULT_DIR_MODE,
        }
    }
}

impl StoreConfigBuilder {
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn shard_prefix_len(mut self, len: usize) -> Self {
        self.shard_prefix_len = len;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Trim and validate. Empty base directory or bucket is an error, and the
    /// bucket must be a single directory name below the base directory.
    pub fn build(self) -> Result<StoreConfig, StoreError> {
        let base_dir = trim_path(self.base_dir);
        if base_dir.as_os_str().is_empty() {
            return Err(StoreError::DataDirectoryNotSpecified);
        }

        let bucket = self.bucket.trim().to_string();
        if bucket.is_empty() {
            return Err(StoreError::BucketNotSpecified);
        }
        if !is_single_dir_name(&bucket) {
            return Err(StoreError::InvalidBucket { bucket });
        }

        Ok(StoreConfig {
            base_dir,
            bucket,
            shard_prefix_len: self.shard_prefix_len,
            debug: self.debug,
            algorithm: self.algorithm,
            dir_mode: self.dir_mode,
        })
    }
}

fn is_single_dir_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn trim_path(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) if s.trim().len() != s.len() => PathBuf::from(s.trim()),
        _ => path,
    }
}
