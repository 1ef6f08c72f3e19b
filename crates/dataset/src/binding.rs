//! Binding a request's session to an opened dataset
//!
//! One `AppContext` is built per process and shared by every request
//! handler. It owns the path resolver, the S3 sync cache, the dataset
//! loader and the "current" dataset/config pair the viewer reads from.
//! The current pair is last-writer-wins: a reader may see a dataset
//! bound by a different session.

use crate::DatasetError;
use crate::adaptor::{DataAdaptor, FileMatrixLoader, MatrixDataLoader};
use crate::app_config::{AnnotationsLocation, AppConfig};
use crate::loader::DatasetLoader;
use crate::session::SessionState;
use annostore::{
    DatasetReference, PathResolver, S3SyncCache, Settings, Transfer, check_key, strip_bucket_prefix,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Dataset shown when the session has not picked one
pub const DEMO_DATASET: &str = "pbmc68k_reduced";

/// Path reported for the demo dataset
pub const DEMO_PATH: &str = "scanpy pbmc68k_reduced";

#[derive(Debug, Clone)]
pub enum Dataset {
    /// The session's dataset, opened
    Loaded(Arc<DataAdaptor>),
    /// Built-in demo dataset of the analysis library, by name
    Demo(&'static str),
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub found: bool,
    pub path: String,
    pub handle: Option<Arc<DataAdaptor>>,
    pub dataset: Dataset,
}

impl Binding {
    fn demo() -> Self {
        Binding {
            found: false,
            path: DEMO_PATH.to_string(),
            handle: None,
            dataset: Dataset::Demo(DEMO_DATASET),
        }
    }
}

pub struct AppContext {
    settings: Settings,
    resolver: PathResolver,
    sync: Option<Arc<S3SyncCache>>,
    loader: DatasetLoader,
    current: RwLock<Option<(Arc<DataAdaptor>, AppConfig)>>,
}

impl AppContext {
    /// Context with the file loader, fetching S3 datasets through `transfer`
    pub fn new(settings: Settings, transfer: Arc<dyn Transfer>) -> Result<Self, DatasetError> {
        let sync = sync_cache(&settings, transfer)?;
        let matrix: Arc<dyn MatrixDataLoader> = match &sync {
            Some(sync) => Arc::new(FileMatrixLoader::with_sync_cache(sync.clone())),
            None => Arc::new(FileMatrixLoader::local_only()),
        };
        Self::assemble(settings, sync, matrix)
    }

    /// Context with a caller-supplied matrix loader
    pub fn with_loader(
        settings: Settings,
        transfer: Arc<dyn Transfer>,
        matrix: Arc<dyn MatrixDataLoader>,
    ) -> Result<Self, DatasetError> {
        let sync = sync_cache(&settings, transfer)?;
        Self::assemble(settings, sync, matrix)
    }

    fn assemble(
        settings: Settings,
        sync: Option<Arc<S3SyncCache>>,
        matrix: Arc<dyn MatrixDataLoader>,
    ) -> Result<Self, DatasetError> {
        settings.validate()?;
        let resolver = PathResolver::new(settings.annotation_root.clone(), settings.bucket.clone());
        let loader = DatasetLoader::new(matrix, settings.cache_capacity);
        Ok(Self {
            settings,
            resolver,
            sync,
            loader,
            current: RwLock::new(None),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn sync_cache(&self) -> Option<&Arc<S3SyncCache>> {
        self.sync.as_ref()
    }

    pub fn loader(&self) -> &DatasetLoader {
        &self.loader
    }

    /// Open the session's dataset, or fall back to the demo dataset when there is none
    pub async fn load_for_request(&self, session: &SessionState) -> Result<Binding, DatasetError> {
        let Some(dataset_path) = session.dataset_path.as_deref().filter(|p| !p.is_empty()) else {
            diagnostics::info!("Session data not found");
            return Ok(Binding::demo());
        };
        diagnostics::info!("Session data found: {dataset_path}", dataset_path: dataset_path);

        let mut config = self.configure(dataset_path, session.csv()).await?;
        let handle = self.loader.open(dataset_path, &config).await?;
        config.complete()?;

        *self.current.write().await = Some((handle.clone(), config));

        Ok(Binding {
            found: true,
            path: dataset_path.to_string(),
            handle: Some(handle.clone()),
            dataset: Dataset::Loaded(handle),
        })
    }

    /// Fresh viewer configuration for `dataset_path`
    ///
    /// Annotations point at the csv when one is given, else at the dataset's directory.
    pub async fn configure(
        &self,
        dataset_path: &str,
        csv_path: Option<&str>,
    ) -> Result<AppConfig, DatasetError> {
        let mut config = AppConfig::for_dataset(dataset_path);

        let annotations = match csv_path {
            Some(csv) => {
                diagnostics::info!("Got a csv: {csv}", csv: csv);
                let local = self.fetch(csv).await?;
                AnnotationsLocation::File(local)
            }
            None => {
                let reference = self.in_bucket(dataset_path)?;
                let resolved = self.resolver.resolve(&reference).await?;
                AnnotationsLocation::Directory(resolved.annotations_dir)
            }
        };
        config.set_annotations(annotations);
        config.set_region(self.settings.region.clone());
        Ok(config)
    }

    async fn fetch(&self, csv: &str) -> Result<std::path::PathBuf, DatasetError> {
        let sync = self.sync.as_ref().ok_or_else(|| {
            DatasetError::configuration("annotation csv needs a configured bucket")
        })?;
        let reference = self.in_bucket(csv)?;
        Ok(sync.ensure_local(&reference).await?.local_path)
    }

    /// Parse `path`, rejecting `s3://` references to any bucket but ours
    /// and keys that would resolve outside the local tree
    fn in_bucket(&self, path: &str) -> Result<DatasetReference, DatasetError> {
        let reference = DatasetReference::new(path)?;
        let bucket = self.resolver.bucket();
        if reference.is_s3() && !bucket.is_empty() && !reference.is_in_bucket(bucket) {
            return Err(DatasetError::access(
                path,
                format!("outside the configured bucket {bucket}"),
            ));
        }
        let key = strip_bucket_prefix(reference.as_str(), bucket);
        if check_key(&key).is_err() {
            return Err(DatasetError::access(path, "key leaves the annotations tree"));
        }
        Ok(reference)
    }

    /// Handle published by the most recent successful bind
    pub async fn current_handle(&self) -> Option<Arc<DataAdaptor>> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|(handle, _)| handle.clone())
    }

    pub async fn current_config(&self) -> Option<AppConfig> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|(_, config)| config.clone())
    }

    /// Reopen the current dataset past the loader cache and publish the result
    pub async fn reload_current(&self) -> Result<Option<Arc<DataAdaptor>>, DatasetError> {
        let Some(config) = self.current_config().await else {
            return Ok(None);
        };
        let handle = self.loader.open_uncached(&config).await?;
        *self.current.write().await = Some((handle.clone(), config));
        Ok(Some(handle))
    }
}

fn sync_cache(
    settings: &Settings,
    transfer: Arc<dyn Transfer>,
) -> Result<Option<Arc<S3SyncCache>>, DatasetError> {
    if settings.bucket.is_empty() {
        diagnostics::warn!("No bucket configured, S3 datasets are unavailable");
        return Ok(None);
    }
    Ok(Some(Arc::new(S3SyncCache::new(settings, transfer)?)))
}
