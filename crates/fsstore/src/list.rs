//! Enumeration of stored objects.
//!
//! A listing is produced by one Tokio task walking the bucket tree depth-first.
//! Ids are handed over a channel of capacity 1, so the walk advances only as
//! fast as the consumer takes ids. The walk ends in exactly one of three ways:
//!
//! - exhausted: id channel closes, terminal slot closes empty
//! - cancelled or past deadline: the context's error lands in the terminal slot
//! - filesystem error: `ObjectReadFailed` lands in the terminal slot
//!
//! Emission order follows directory iteration order and is not stable.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::context::OpContext;
use crate::digest::ContentId;
use crate::error::StoreError;
use crate::publish::is_staging_name;

/// A one-shot stream of object ids plus the walk's terminal error slot.
#[derive(Debug)]
pub struct ObjectListing {
    ids: mpsc::Receiver<ContentId>,
    outcome: oneshot::Receiver<StoreError>,
}

impl ObjectListing {
    /// Next id, or `None` once the walk has stopped for any reason.
    pub async fn next(&mut self) -> Option<ContentId> {
        self.ids.recv().await
    }

    /// Like [`next`](Self::next) for synchronous callers. Panics if called
    /// from inside an async context.
    pub fn blocking_next(&mut self) -> Option<ContentId> {
        self.ids.blocking_recv()
    }

    /// Drain any ids not yet consumed, then report how the walk ended.
    pub async fn finish(mut self) -> Result<(), StoreError> {
        while self.ids.recv().await.is_some() {}
        match self.outcome.await {
            Ok(err) => Err(err),
            // Sender dropped without a value: clean completion.
            Err(_) => Ok(()),
        }
    }

    /// Collect every id, failing if the walk did not complete cleanly.
    pub async fn collect(mut self) -> Result<Vec<ContentId>, StoreError> {
        let mut ids = Vec::new();
        while let Some(id) = self.ids.recv().await {
            ids.push(id);
        }
        self.finish().await?;
        Ok(ids)
    }

    /// Split into a `Stream` of ids and the terminal error slot.
    pub fn into_parts(self) -> (ReceiverStream<ContentId>, oneshot::Receiver<StoreError>) {
        (ReceiverStream::new(self.ids), self.outcome)
    }
}

/// Start walking `root`. Must be called from within a Tokio runtime.
pub(crate) fn spawn_listing(ctx: OpContext, root: PathBuf, debug: bool) -> ObjectListing {
    let (tx, rx) = mpsc::channel(1);
    let (outcome_tx, outcome_rx) = oneshot::channel();

    tokio::spawn(async move {
        match walk(&ctx, &root, &tx, debug).await {
            Ok(emitted) => {
                if debug {
                    debug!(root = %root.display(), emitted, "listing complete");
                }
            }
            Err(err) => {
                if !err.is_context_error() {
                    warn!(root = %root.display(), error = %err, "listing aborted");
                }
                let _ = outcome_tx.send(err);
            }
        }
        drop(tx);
    });

    ObjectListing {
        ids: rx,
        outcome: outcome_rx,
    }
}

async fn walk(
    ctx: &OpContext,
    root: &Path,
    tx: &mpsc::Sender<ContentId>,
    debug: bool,
) -> Result<u64, StoreError> {
    let mut pending = vec![root.to_path_buf()];
    let mut emitted = 0u64;

    while let Some(dir) = pending.pop() {
        ctx.check()?;
        if debug {
            debug!(dir = %dir.display(), "listing directory");
        }

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // A bucket nobody has written to yet is empty, not broken.
            Err(e) if e.kind() == io::ErrorKind::NotFound && dir == root => return Ok(0),
            Err(source) => return Err(read_failed(dir, source)),
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => return Err(read_failed(dir, source)),
            };
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|source| read_failed(path.clone(), source))?;

            if file_type.is_dir() {
                pending.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                warn!(path = %path.display(), "skipping non-utf8 file name");
                continue;
            };
            if is_staging_name(name) {
                continue;
            }
            let cid = match ContentId::from_str_checked(name) {
                Ok(cid) => cid,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping stray file");
                    continue;
                }
            };

            tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                sent = tx.send(cid) => {
                    if sent.is_err() {
                        // Consumer dropped the listing.
                        return Ok(emitted);
                    }
                    emitted += 1;
                }
            }
        }
    }

    Ok(emitted)
}

fn read_failed(link: PathBuf, source: io::Error) -> StoreError {
    StoreError::ObjectReadFailed { link, source }
}
