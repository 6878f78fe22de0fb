//! Store error taxonomy.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::digest::ContentId;

/// Errors surfaced by the object store.
///
/// Construction errors (`BucketNotSpecified`, `InvalidBucket`,
/// `DataDirectoryNotSpecified`, `DataDirectoryCreateFailed`) only come out of store construction. Everything
/// else is local to the call that produced it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {cid}")]
    ObjectNotFound { cid: ContentId },

    #[error("failed to read object at {}", link.display())]
    ObjectReadFailed {
        link: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write object at {}", link.display())]
    ObjectWriteFailed {
        link: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("operation cancelled")]
    OperationCancelled,

    #[error("operation deadline exceeded")]
    OperationDeadlineExceeded,

    #[error("bucket not specified")]
    BucketNotSpecified,

    #[error("invalid bucket name {bucket:?}: must be a single directory name")]
    InvalidBucket { bucket: String },

    #[error("data directory not specified")]
    DataDirectoryNotSpecified,

    #[error("failed to create data directory {}", path.display())]
    DataDirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to digest object content")]
    DigestionFailed {
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// True for cancellation and deadline errors, which say nothing about the
    /// state of the store.
    pub fn is_context_error(&self) -> bool {
        matches!(
            self,
            StoreError::OperationCancelled | StoreError::OperationDeadlineExceeded
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::ObjectNotFound { .. })
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
