//! Error types for annotation store operations

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid dataset reference: {0:?}")]
    InvalidReference(String),

    #[error("Dataset key leaves the local tree: {0:?}")]
    UnsafeKey(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transfer failed: `{command}` exited with {status}: {stderr}")]
    TransferFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl Error {
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn path<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Error::Path {
            path: path.into(),
            source,
        }
    }

    /// True for failures of the external copy/sync command
    pub fn is_transfer(&self) -> bool {
        matches!(self, Error::TransferFailed { .. } | Error::Spawn { .. })
    }
}
