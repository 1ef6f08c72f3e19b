//! Annotation store: local mirror of an S3 bucket of single-cell datasets
//!
//! This crate owns everything that touches S3 or the local annotations
//! tree:
//!
//! - **Settings**: environment (`CELLXGENE_BUCKET`, `ANNOTATION_DIR`,
//!   `AWS_DEFAULT_REGION`, `SYNC_ENABLED`, `SCRIPT_NAME`) plus a YAML overlay
//! - **PathResolver**: bucket prefix stripping and annotations directories
//! - **S3SyncCache**: download-once cache of single objects
//! - **PushTask**: periodic `sync` of the local tree up to the bucket
//! - **Catalog**: `.h5ad` / `.csv` listing for the dataset picker
//!
//! # Layout
//!
//! ```text
//! {ANNOTATION_DIR}/{bucket}/{key}                  downloaded objects
//! {ANNOTATION_DIR}/{bucket}/{key}_annotations/     per-dataset user annotations
//! ```

mod error;

pub mod catalog;
pub mod config;
pub mod memo;
pub mod push;
pub mod resolve;
pub mod sync_cache;
pub mod testing;
pub mod transfer;

pub use catalog::{Catalog, ListedObject, list_catalog};
pub use config::{PathnameParams, Settings, SettingsFile};
pub use error::Error;
pub use memo::{CacheStats, Clock, CounterClock, ManualClock, MemoCache};
pub use push::{PushOutcome, PushTask};
pub use resolve::{DatasetReference, PathResolver, ResolvedPath, check_key, strip_bucket_prefix};
pub use sync_cache::{LocalObject, S3SyncCache};
pub use transfer::{AwsCli, Transfer};

/// Result type for annotation store operations
pub type Result<T> = std::result::Result<T, Error>;
