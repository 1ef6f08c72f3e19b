//! Dataset side of the single-cell web backend
//!
//! Opens annotated matrices for a request's session and keeps the
//! process-wide current dataset. S3 access and the annotations tree are
//! delegated to `annostore`. `access` decides which views a request may see.

mod error;

pub mod access;
pub mod adaptor;
pub mod app_config;
pub mod binding;
pub mod loader;
pub mod session;

pub use access::{
    AccessDecision, AccessPolicy, Endpoint, GrantTable, PermissionChecker, ViewPermissions,
};
pub use adaptor::{DataAdaptor, FileMatrixLoader, MatrixDataLoader, MatrixDataType};
pub use app_config::{AnnotationsLocation, AppConfig, DatasetConfig, ServerConfig};
pub use binding::{AppContext, Binding, DEMO_DATASET, DEMO_PATH, Dataset};
pub use error::DatasetError;
pub use loader::DatasetLoader;
pub use session::{DatasetSelection, SessionState, ViewType};
