//! FileObjectStore: filesystem-backed content addressable object store.
//!
//! Implements the [`ObjectStore`] trait on a local directory tree. See
//! [`link`](crate::link) for the on-disk layout.
//!
//! Has/Read/Create run synchronously on the calling thread. Listing runs on
//! a Tokio task. There is no in-memory state beyond the configuration, and no
//! locking: two writers of one id necessarily write the same bytes, and
//! publication is a rename, so the last writer wins harmlessly.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::context::OpContext;
use crate::digest::{ContentHasher, ContentId};
use crate::error::{Result, StoreError};
use crate::list::{spawn_listing, ObjectListing};
use crate::publish::{ensure_dir, StagedFile};

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Trait for object storage backends.
pub trait ObjectStore: Send + Sync {
    /// Whether a regular file exists for `cid`. Never fails.
    fn has_object(&self, ctx: &OpContext, cid: &ContentId) -> bool;

    /// Read an object's bytes exactly as stored.
    fn read_object(&self, ctx: &OpContext, cid: &ContentId) -> Result<Vec<u8>>;

    /// Store `data`, returning its id. Storing existing content is a no-op.
    fn create_object(&self, ctx: &OpContext, data: &[u8]) -> Result<ContentId>;

    /// The id `data` would be stored under.
    fn digest_object(&self, data: &[u8]) -> ContentId;

    /// Start a listing of every stored object.
    fn list_objects(&self, ctx: &OpContext) -> ObjectListing;
}

/// What the store knows about an object without reading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub cid: ContentId,
    pub size_bytes: u64,
    pub link: PathBuf,
}

/// Filesystem-based object store.
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    config: StoreConfig,
}

impl FileObjectStore {
    /// Open a store, creating `base_dir/bucket` if it doesn't exist.
    pub fn new(config: StoreConfig) -> Result<Self> {
        let bucket_dir = config.bucket_dir();
        ensure_dir(&bucket_dir, config.dir_mode()).map_err(|source| {
            StoreError::DataDirectoryCreateFailed {
                path: bucket_dir.clone(),
                source,
            }
        })?;

        info!(
            bucket_dir = %bucket_dir.display(),
            algorithm = %config.algorithm(),
            shard_prefix_len = config.shard_prefix_len(),
            "object store opened"
        );
        Ok(Self { config })
    }

    /// Open a store at `base_dir` with every other setting defaulted.
    pub fn at_path(base_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(StoreConfig::at_path(base_dir)?)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The path an object with this id lives at, whether or not it exists.
    pub fn object_link(&self, cid: &ContentId) -> PathBuf {
        let link = self.config.object_link(cid);
        if self.config.debug() {
            debug!(%cid, link = %link.display(), "resolved object link");
        }
        link
    }

    /// Size and location of a stored object.
    pub fn stat_object(&self, ctx: &OpContext, cid: &ContentId) -> Result<ObjectInfo> {
        ctx.check()?;
        let link = self.object_link(cid);
        match fs::metadata(&link) {
            Ok(meta) if meta.is_file() => Ok(ObjectInfo {
                cid: cid.clone(),
                size_bytes: meta.len(),
                link,
            }),
            Ok(_) => Err(StoreError::ObjectNotFound { cid: cid.clone() }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::ObjectNotFound { cid: cid.clone() })
            }
            Err(source) => Err(StoreError::ObjectReadFailed { link, source }),
        }
    }

    /// Store everything `reader` yields without buffering it in memory.
    ///
    /// Content streams into a staging file while being hashed, then is
    /// published under its id, or discarded if that id already exists.
    pub fn create_object_from_reader<R: Read>(
        &self,
        ctx: &OpContext,
        mut reader: R,
    ) -> Result<ContentId> {
        ctx.check()?;

        let bucket_dir = self.config.bucket_dir();
        let mut staged = StagedFile::create_in(&bucket_dir).map_err(|source| {
            StoreError::ObjectWriteFailed {
                link: bucket_dir.clone(),
                source,
            }
        })?;

        let mut hasher = ContentHasher::new(self.config.algorithm());
        let mut buf = vec![0u8; COPY_BUF_SIZE];
        loop {
            ctx.check()?;
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(StoreError::DigestionFailed { source }),
            };
            hasher.update(&buf[..n]);
            staged
                .write_all(&buf[..n])
                .map_err(|source| StoreError::ObjectWriteFailed {
                    link: staged.path().to_path_buf(),
                    source,
                })?;
        }

        let cid = hasher.finish();
        ctx.check()?;
        if self.has_object(ctx, &cid) {
            if self.config.debug() {
                debug!(%cid, "skip writing existing object");
            }
            return Ok(cid);
        }

        let size = staged.bytes_written();
        let link = self.object_link(&cid);
        let write_err = |source| StoreError::ObjectWriteFailed {
            link: link.clone(),
            source,
        };
        if let Some(parent) = link.parent() {
            ensure_dir(parent, self.config.dir_mode()).map_err(write_err)?;
        }
        staged.publish(&link).map_err(write_err)?;

        if self.config.debug() {
            debug!(%cid, size, "created object from stream");
        }
        Ok(cid)
    }

    fn read_link(&self, link: PathBuf) -> Result<Vec<u8>> {
        fs::read(&link).map_err(|source| {
            warn!(link = %link.display(), error = %source, "reading object failed");
            StoreError::ObjectReadFailed { link, source }
        })
    }

    fn write_object(&self, link: &Path, data: &[u8]) -> Result<()> {
        let write_err = |source| StoreError::ObjectWriteFailed {
            link: link.to_path_buf(),
            source,
        };

        let dir = match link.parent() {
            Some(parent) => parent.to_path_buf(),
            None => self.config.bucket_dir(),
        };
        ensure_dir(&dir, self.config.dir_mode()).map_err(write_err)?;

        let mut staged = StagedFile::create_in(&dir).map_err(write_err)?;
        staged.write_all(data).map_err(write_err)?;
        staged.publish(link).map_err(write_err)
    }
}

impl ObjectStore for FileObjectStore {
    fn has_object(&self, _ctx: &OpContext, cid: &ContentId) -> bool {
        let link = self.object_link(cid);
        let exists = match fs::metadata(&link) {
            Ok(meta) => meta.is_file(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(link = %link.display(), error = %e, "stat failed, treating object as absent");
                false
            }
        };
        if self.config.debug() {
            debug!(%cid, exists, "has object");
        }
        exists
    }

    fn read_object(&self, ctx: &OpContext, cid: &ContentId) -> Result<Vec<u8>> {
        ctx.check()?;
        if !self.has_object(ctx, cid) {
            return Err(StoreError::ObjectNotFound { cid: cid.clone() });
        }

        self.read_link(self.object_link(cid))
    }

    fn create_object(&self, ctx: &OpContext, data: &[u8]) -> Result<ContentId> {
        let cid = self.digest_object(data);
        ctx.check()?;

        if self.has_object(ctx, &cid) {
            if self.config.debug() {
                debug!(%cid, "skip writing existing object");
            }
            return Ok(cid);
        }

        let link = self.object_link(&cid);
        self.write_object(&link, data).inspect_err(|e| {
            warn!(%cid, error = %e, "writing object failed");
        })?;

        if self.config.debug() {
            debug!(%cid, size = data.len(), "created object");
        }
        Ok(cid)
    }

    fn digest_object(&self, data: &[u8]) -> ContentId {
        ContentId::from_data(self.config.algorithm(), data)
    }

    fn list_objects(&self, ctx: &OpContext) -> ObjectListing {
        spawn_listing(ctx.clone(), self.config.bucket_dir(), self.config.debug())
    }
}
