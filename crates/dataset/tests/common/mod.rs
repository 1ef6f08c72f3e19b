//! Fakes shared by the dataset integration tests

use annostore::Settings;
use async_trait::async_trait;
use dataset::{AppConfig, DataAdaptor, DatasetError, MatrixDataLoader, MatrixDataType};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Loader that builds adaptors without touching the filesystem
#[derive(Default)]
pub struct CountingLoader {
    opens: AtomicUsize,
    fail: AtomicBool,
    opened: Mutex<Vec<String>>,
}

impl CountingLoader {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MatrixDataLoader for CountingLoader {
    async fn open(&self, location: &str, config: &AppConfig) -> Result<DataAdaptor, DatasetError> {
        _ = self.opens.fetch_add(1, Ordering::SeqCst);
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(location.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(DatasetError::access(location, "does not exist"));
        }
        Ok(DataAdaptor {
            location: location.to_string(),
            local_path: PathBuf::from(location),
            data_type: MatrixDataType::from_location(location).unwrap_or(MatrixDataType::H5ad),
            size_bytes: 0,
            annotations: config.annotations(),
            title: config.server.title.clone().unwrap_or_default(),
            backed: config.server.backed,
        })
    }
}

#[allow(dead_code)]
pub fn settings(root: &Path, bucket: &str) -> anyhow::Result<Settings> {
    let root = root.to_string_lossy().into_owned();
    let bucket = bucket.to_string();
    Ok(Settings::from_lookup(move |key| match key {
        "ANNOTATION_DIR" => Some(root.clone()),
        "CELLXGENE_BUCKET" => Some(bucket.clone()),
        "AWS_DEFAULT_REGION" => Some("eu-west-1".to_string()),
        _ => None,
    })?)
}
