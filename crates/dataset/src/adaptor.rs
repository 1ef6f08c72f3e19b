//! Matrix data adaptors and the loader that opens them
//!
//! The heavy lifting of reading an annotated matrix stays with the
//! analysis stack. What happens here is the part the web tier needs
//! before handing a path over: fetch the object if it lives in S3,
//! recognise the format, check that the file really is what its name
//! says, and capture the annotation settings it was opened with.

use crate::DatasetError;
use crate::app_config::{AnnotationsLocation, AppConfig};
use annostore::{DatasetReference, S3SyncCache};
use async_trait::async_trait;
use serde::Serialize;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Every HDF5 file starts with this signature, at offset 0 or a power of two from 512 on.
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// Largest user-block offset probed for the HDF5 signature
const HDF5_MAX_PROBE: u64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatrixDataType {
    /// AnnData HDF5 file
    H5ad,
    /// Viewer-native directory format
    Cxg,
}

impl MatrixDataType {
    pub fn from_location(location: &str) -> Option<Self> {
        let trimmed = location.trim_end_matches('/').to_ascii_lowercase();
        if trimmed.ends_with(".h5ad") {
            Some(MatrixDataType::H5ad)
        } else if trimmed.ends_with(".cxg") {
            Some(MatrixDataType::Cxg)
        } else {
            None
        }
    }
}

/// An opened dataset
#[derive(Debug, Serialize)]
pub struct DataAdaptor {
    /// Path or URI the dataset was requested as
    pub location: String,
    pub local_path: PathBuf,
    pub data_type: MatrixDataType,
    pub size_bytes: u64,
    /// Annotation settings in effect when the dataset was opened
    pub annotations: AnnotationsLocation,
    pub title: String,
    pub backed: bool,
}

/// Opens a dataset location into an adaptor
#[async_trait]
pub trait MatrixDataLoader: Send + Sync {
    async fn open(&self, location: &str, config: &AppConfig) -> Result<DataAdaptor, DatasetError>;
}

/// Loader for local `.h5ad` / `.cxg` paths, fetching `s3://` locations through the sync cache
pub struct FileMatrixLoader {
    sync: Option<Arc<S3SyncCache>>,
}

impl FileMatrixLoader {
    /// Loader that rejects `s3://` locations
    pub fn local_only() -> Self {
        Self { sync: None }
    }

    pub fn with_sync_cache(sync: Arc<S3SyncCache>) -> Self {
        Self { sync: Some(sync) }
    }

    async fn localize(&self, location: &str) -> Result<PathBuf, DatasetError> {
        if !location.starts_with("s3://") {
            return Ok(PathBuf::from(location));
        }
        let Some(sync) = &self.sync else {
            return Err(DatasetError::access(location, "S3 datasets need a configured bucket"));
        };
        let reference = DatasetReference::new(location)?;
        if !reference.is_in_bucket(sync.bucket()) {
            return Err(DatasetError::access(
                location,
                format!("outside the configured bucket {}", sync.bucket()),
            ));
        }
        Ok(sync.ensure_local(&reference).await?.local_path)
    }
}

#[async_trait]
impl MatrixDataLoader for FileMatrixLoader {
    async fn open(&self, location: &str, config: &AppConfig) -> Result<DataAdaptor, DatasetError> {
        let data_type = MatrixDataType::from_location(location).ok_or_else(|| {
            DatasetError::access(location, "unsupported format, expected .h5ad or .cxg")
        })?;

        let local_path = self.localize(location).await?;
        let metadata = tokio::fs::metadata(&local_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DatasetError::access(location, "does not exist")
            } else {
                DatasetError::access(location, e.to_string())
            }
        })?;

        match data_type {
            MatrixDataType::H5ad => {
                if !metadata.is_file() {
                    return Err(DatasetError::access(location, "h5ad dataset is not a file"));
                }
                if !has_hdf5_signature(&local_path, metadata.len())
                    .await
                    .map_err(|e| DatasetError::access(location, e.to_string()))?
                {
                    return Err(DatasetError::access(location, "not an HDF5 file"));
                }
            }
            MatrixDataType::Cxg => {
                if !metadata.is_dir() {
                    return Err(DatasetError::access(location, "cxg dataset is not a directory"));
                }
            }
        }

        let title = config
            .server
            .title
            .clone()
            .unwrap_or_else(|| default_title(&local_path));

        let path_str = local_path.display().to_string();
        diagnostics::info!(
            "Opened {location} from {path_str}",
            location: location,
            path_str: path_str
        );

        Ok(DataAdaptor {
            location: location.to_string(),
            size_bytes: metadata.len(),
            local_path,
            data_type,
            annotations: config.annotations(),
            title,
            backed: config.server.backed,
        })
    }
}

fn default_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn has_hdf5_signature(path: &Path, len: u64) -> std::io::Result<bool> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = [0u8; 8];
    let mut offset = 0u64;

    while offset + 8 <= len && offset <= HDF5_MAX_PROBE {
        _ = file.seek(SeekFrom::Start(offset)).await?;
        _ = file.read_exact(&mut buf).await?;
        if buf == HDF5_SIGNATURE {
            return Ok(true);
        }
        offset = if offset == 0 { 512 } else { offset * 2 };
    }
    Ok(false)
}
