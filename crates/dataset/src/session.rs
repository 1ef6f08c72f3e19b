//! Per-user session payload and the dataset picker's form handling
//!
//! The payload is shared with the web framework as JSON under the keys
//! `adata_path`, `csv` and `dataset`.

use crate::DatasetError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewType {
    Cellxgene,
    ScanpyEmbeddings,
    ScanpyDataframes,
}

impl ViewType {
    pub const ALL: [ViewType; 3] = [
        ViewType::Cellxgene,
        ViewType::ScanpyEmbeddings,
        ViewType::ScanpyDataframes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ViewType::Cellxgene => "cellxgene",
            ViewType::ScanpyEmbeddings => "scanpy-embeddings",
            ViewType::ScanpyDataframes => "scanpy-dataframes",
        }
    }

    /// Route the picker redirects to after a dataset is chosen
    pub fn url(self) -> &'static str {
        match self {
            ViewType::Cellxgene => "/cellxgene",
            ViewType::ScanpyEmbeddings => "/dash/scanpy/embeddings/",
            ViewType::ScanpyDataframes => "/dash/scanpy/dataframes/",
        }
    }
}

impl FromStr for ViewType {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewType::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| DatasetError::UnknownViewType(s.to_string()))
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(rename = "adata_path", default, skip_serializing_if = "Option::is_none")]
    pub dataset_path: Option<String>,
    #[serde(rename = "csv", default, skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
}

/// Fields posted by the dataset list form, as `{bucket}/{key}` without a scheme
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DatasetSelection {
    #[serde(rename = "view-type")]
    pub view_type: String,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub csv: Option<String>,
}

impl SessionState {
    pub fn from_json(text: &str) -> Result<Self, DatasetError> {
        serde_json::from_str(text)
            .map_err(|e| DatasetError::configuration(format!("invalid session payload: {e}")))
    }

    pub fn to_json(&self) -> Result<String, DatasetError> {
        serde_json::to_string(self)
            .map_err(|e| DatasetError::configuration(format!("session payload: {e}")))
    }

    pub fn has_dataset(&self) -> bool {
        self.dataset_path.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Non-empty csv path, if any
    pub fn csv(&self) -> Option<&str> {
        self.csv_path.as_deref().filter(|p| !p.is_empty())
    }

    /// Record a picker submission. Returns the redirect target when a dataset was chosen.
    ///
    /// An earlier `dataset_path` is kept when the form carries no dataset.
    pub fn apply_selection(
        &mut self,
        selection: &DatasetSelection,
    ) -> Result<Option<&'static str>, DatasetError> {
        self.dataset = None;
        self.csv_path = None;

        if let Some(csv) = selection.csv.as_deref().filter(|c| !c.is_empty()) {
            self.csv_path = Some(format!("s3://{csv}"));
        }

        let Some(dataset) = selection.dataset.as_deref().filter(|d| !d.is_empty()) else {
            return Ok(None);
        };
        let view: ViewType = selection.view_type.parse()?;
        let path = format!("s3://{dataset}");
        let view_name = view.name();
        diagnostics::info!("Selected {path} for {view_name}", path: path, view_name: view_name);
        self.dataset_path = Some(path);
        Ok(Some(view.url()))
    }
}
