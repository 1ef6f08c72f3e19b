//! Download-once cache of single S3 objects
//!
//! `ensure_local` copies `s3://{bucket}/{key}` to
//! `{annotation_root}/{bucket}/{key}` the first time a reference is
//! seen, and answers from memory afterwards. The cache is keyed by the
//! literal reference string, so `s3://b/x` and `x` are separate entries
//! even though they land on the same file.

use crate::config::Settings;
use crate::memo::{CacheStats, Clock, CounterClock, MemoCache};
use crate::resolve::{DatasetReference, check_key, strip_bucket_prefix};
use crate::transfer::Transfer;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A downloaded object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalObject {
    pub local_path: PathBuf,
    /// Bucket-relative key the object was fetched from
    pub key: String,
}

pub struct S3SyncCache {
    bucket: String,
    local_root: PathBuf,
    transfer: Arc<dyn Transfer>,
    cache: MemoCache<LocalObject>,
}

impl S3SyncCache {
    /// Fails with a configuration error when no bucket is configured
    pub fn new(settings: &Settings, transfer: Arc<dyn Transfer>) -> Result<Self> {
        Self::with_clock(settings, transfer, Arc::new(CounterClock::default()))
    }

    pub fn with_clock(
        settings: &Settings,
        transfer: Arc<dyn Transfer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let bucket = settings.require_bucket()?.to_string();
        Ok(Self {
            bucket,
            local_root: settings.bucket_dir(),
            transfer,
            cache: MemoCache::with_clock("s3-sync", settings.cache_capacity, clock),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Directory downloads are written under
    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Make sure the object named by `reference` exists locally
    pub async fn ensure_local(&self, reference: &DatasetReference) -> Result<LocalObject> {
        self.cache
            .get_or_try_insert_with(reference.as_str(), || self.download(reference))
            .await
    }

    pub async fn is_cached(&self, reference: &DatasetReference) -> bool {
        self.cache.contains(reference.as_str()).await
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn download(&self, reference: &DatasetReference) -> Result<LocalObject> {
        let key = strip_bucket_prefix(reference.as_str(), &self.bucket);
        if key.is_empty() {
            return Err(Error::InvalidReference(reference.to_string()));
        }
        check_key(&key)?;

        let local_path = self.local_root.join(&key);
        let parent = local_path.parent().unwrap_or(&self.local_root).to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| Error::path(&parent, e))?;

        let remote = format!("s3://{}/{}", self.bucket, key);
        let out = local_path.to_string_lossy().into_owned();
        diagnostics::info!("Syncing {remote} down to {out}", remote: remote, out: out);

        self.transfer.copy(&remote, &out).await?;

        Ok(LocalObject { local_path, key })
    }
}
