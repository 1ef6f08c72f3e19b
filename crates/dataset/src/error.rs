use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    /// Missing, unreadable or unsupported dataset
    #[error("Invalid dataset: {path}: {reason}")]
    DatasetAccess { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown view type: {0}")]
    UnknownViewType(String),

    #[error(transparent)]
    Store(#[from] annostore::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DatasetError {
    pub fn access<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        DatasetError::DatasetAccess {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        DatasetError::Configuration(msg.into())
    }

    /// Status code a web handler should answer with
    pub fn http_status(&self) -> u16 {
        match self {
            DatasetError::DatasetAccess { .. } | DatasetError::UnknownViewType(_) => 400,
            DatasetError::Store(e) if e.is_transfer() => 502,
            DatasetError::Store(
                annostore::Error::InvalidReference(_) | annostore::Error::UnsafeKey(_),
            ) => 400,
            DatasetError::Configuration(_) | DatasetError::Store(_) | DatasetError::Io { .. } => {
                500
            }
        }
    }
}
