//! Filesystem-backed content addressable object store.
//!
//! Objects are named by a digest of their bytes, so identical content is
//! stored once and any tampering with a file changes what its name should be.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fsstore::{FileObjectStore, ObjectStore, OpContext, StoreConfig};
//!
//! # async fn demo() -> Result<(), fsstore::StoreError> {
//! let config = StoreConfig::builder()
//!     .base_dir("/tank/objects")
//!     .bucket("media")
//!     .build()?;
//! let store = FileObjectStore::new(config)?;
//! let ctx = OpContext::background();
//!
//! let cid = store.create_object(&ctx, b"Hello, World!")?;
//! assert!(store.has_object(&ctx, &cid));
//! let bytes = store.read_object(&ctx, &cid)?;
//! assert_eq!(bytes, b"Hello, World!");
//!
//! // Listing runs on a Tokio task.
//! let all = store.list_objects(&ctx).collect().await?;
//! println!("{} objects", all.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! - Content is write-once: one id always means the same bytes
//! - Writes publish by rename, so readers never see partial objects
//! - No locking, in process or across processes
//! - Cancellation is cooperative, checked before filesystem access

pub mod config;
pub mod context;
pub mod digest;
pub mod error;
pub mod link;
pub mod list;
pub mod loader;
pub mod publish;
pub mod store;

pub use config::{StoreConfig, StoreConfigBuilder};
pub use context::OpContext;
pub use digest::{digest, digest_reader, ContentId, ContentIdError, DigestAlgorithm};
pub use error::StoreError;
pub use list::ObjectListing;
pub use loader::{ConfigError, ConfigSources, StoreSection};
pub use store::{FileObjectStore, ObjectInfo, ObjectStore};
