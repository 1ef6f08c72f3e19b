//! Viewer configuration handed to the matrix loader
//!
//! `AppConfig::for_dataset` reproduces the defaults the viewer would get
//! from its own command line, with the datapath filled in. The binding
//! then points user annotations at either a downloaded CSV file or a
//! per-dataset directory and calls `complete`.

use crate::DatasetError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SECRET_KEY: &str = "SparkleAndShine";
pub const DEFAULT_MAX_CATEGORIES: usize = 1000;
pub const DEFAULT_LFC_CUTOFF: f64 = 0.01;
pub const DEFAULT_X_DISTRIBUTION: &str = "normal";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub datapath: Option<String>,
    pub title: Option<String>,
    pub about: Option<String>,
    pub obs_names: Option<String>,
    pub var_names: Option<String>,
    /// Open h5ad files in backed (on-disk) mode
    pub backed: bool,
    pub secret_key: Option<String>,
    pub data_locator_region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub annotations_enabled: bool,
    pub annotations_file: Option<PathBuf>,
    pub annotations_directory: Option<PathBuf>,
    pub gene_sets_file: Option<PathBuf>,
    pub gene_sets_readonly: bool,
    pub max_categories: usize,
    pub custom_colors: bool,
    pub embeddings: Vec<String>,
    pub diffexp_enabled: bool,
    pub diffexp_lfc_cutoff: f64,
    pub x_approximate_distribution: String,
    pub scripts: Vec<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            annotations_enabled: true,
            annotations_file: None,
            annotations_directory: None,
            gene_sets_file: None,
            gene_sets_readonly: false,
            max_categories: DEFAULT_MAX_CATEGORIES,
            custom_colors: true,
            embeddings: Vec::new(),
            diffexp_enabled: true,
            diffexp_lfc_cutoff: DEFAULT_LFC_CUTOFF,
            x_approximate_distribution: DEFAULT_X_DISTRIBUTION.to_string(),
            scripts: Vec::new(),
        }
    }
}

/// Where user annotations for a dataset are read and written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AnnotationsLocation {
    None,
    File(PathBuf),
    Directory(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub dataset: DatasetConfig,
    #[serde(skip)]
    completed: bool,
}

impl AppConfig {
    /// Defaults plus `datapath`, with both annotation settings cleared
    pub fn for_dataset<S: Into<String>>(datapath: S) -> Self {
        let mut config = AppConfig::default();
        config.server.datapath = Some(datapath.into());
        config.server.secret_key = Some(DEFAULT_SECRET_KEY.to_string());
        config
    }

    pub fn datapath(&self) -> Option<&str> {
        self.server.datapath.as_deref()
    }

    pub fn set_annotations(&mut self, location: AnnotationsLocation) {
        self.completed = false;
        match location {
            AnnotationsLocation::None => {
                self.dataset.annotations_file = None;
                self.dataset.annotations_directory = None;
            }
            AnnotationsLocation::File(path) => {
                self.dataset.annotations_file = Some(path);
                self.dataset.annotations_directory = None;
            }
            AnnotationsLocation::Directory(path) => {
                self.dataset.annotations_file = None;
                self.dataset.annotations_directory = Some(path);
            }
        }
    }

    pub fn annotations(&self) -> AnnotationsLocation {
        match (
            &self.dataset.annotations_file,
            &self.dataset.annotations_directory,
        ) {
            (Some(file), _) => AnnotationsLocation::File(file.clone()),
            (None, Some(dir)) => AnnotationsLocation::Directory(dir.clone()),
            (None, None) => AnnotationsLocation::None,
        }
    }

    pub fn set_region<S: Into<String>>(&mut self, region: S) {
        self.completed = false;
        self.server.data_locator_region = Some(region.into());
    }

    /// Validate and mark ready for use
    pub fn complete(&mut self) -> Result<(), DatasetError> {
        let datapath = self
            .server
            .datapath
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| DatasetError::configuration("no datapath configured"))?;

        if datapath.starts_with("s3://")
            && self
                .server
                .data_locator_region
                .as_deref()
                .is_none_or(str::is_empty)
        {
            return Err(DatasetError::configuration(format!(
                "{datapath} needs a data locator region"
            )));
        }

        if self.dataset.annotations_file.is_some() && self.dataset.annotations_directory.is_some()
        {
            return Err(DatasetError::configuration(
                "annotations file and annotations directory are mutually exclusive",
            ));
        }

        if self.dataset.max_categories == 0 {
            return Err(DatasetError::configuration("max_categories must be greater than 0"));
        }

        if self.server.secret_key.as_deref().is_none_or(str::is_empty) {
            self.server.secret_key = Some(DEFAULT_SECRET_KEY.to_string());
        }

        self.completed = true;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }
}
