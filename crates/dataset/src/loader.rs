//! Process-wide memo of opened datasets
//!
//! The cache key is the dataset path alone. A second `open` of the same
//! path with a different `AppConfig` gets the adaptor built from the
//! first config, including its annotation settings. Call
//! `open_uncached` when the configuration must be re-applied.

use crate::DatasetError;
use crate::adaptor::{DataAdaptor, MatrixDataLoader};
use crate::app_config::AppConfig;
use annostore::{CacheStats, Clock, CounterClock, MemoCache};
use std::sync::Arc;

pub const DEFAULT_CAPACITY: usize = 10;

pub struct DatasetLoader {
    matrix: Arc<dyn MatrixDataLoader>,
    cache: MemoCache<Arc<DataAdaptor>>,
}

impl DatasetLoader {
    pub fn new(matrix: Arc<dyn MatrixDataLoader>, capacity: usize) -> Self {
        Self::with_clock(matrix, capacity, Arc::new(CounterClock::default()))
    }

    pub fn with_clock(
        matrix: Arc<dyn MatrixDataLoader>,
        capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            matrix,
            cache: MemoCache::with_clock("dataset", capacity, clock),
        }
    }

    /// Open `path`, reusing the adaptor from an earlier open of the same path
    pub async fn open(
        &self,
        path: &str,
        config: &AppConfig,
    ) -> Result<Arc<DataAdaptor>, DatasetError> {
        self.cache
            .get_or_try_insert_with(path, || self.load(path, config))
            .await
    }

    /// Open the config's datapath without reading or updating the cache
    pub async fn open_uncached(
        &self,
        config: &AppConfig,
    ) -> Result<Arc<DataAdaptor>, DatasetError> {
        let path = config
            .datapath()
            .ok_or_else(|| DatasetError::configuration("no datapath configured"))?;
        Ok(Arc::new(self.matrix.open(path, config).await?))
    }

    pub async fn is_cached(&self, path: &str) -> bool {
        self.cache.contains(path).await
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn load(&self, path: &str, config: &AppConfig) -> Result<Arc<DataAdaptor>, DatasetError> {
        diagnostics::info!("Loading matrix {path}", path: path);
        match self.matrix.open(path, config).await {
            Ok(adaptor) => Ok(Arc::new(adaptor)),
            Err(e) => {
                let reason = e.to_string();
                diagnostics::warn!("Could not open {path}: {reason}", path: path, reason: reason);
                Err(e)
            }
        }
    }
}
