//! Dataset references and the bucket-relative keys derived from them

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Suffix appended to a dataset key to name its annotations directory
pub const ANNOTATIONS_SUFFIX: &str = "_annotations";

/// A local path or an `s3://bucket/key` URI naming a dataset or CSV file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetReference(String);

impl DatasetReference {
    pub fn new<S: Into<String>>(reference: S) -> Result<Self> {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(Error::InvalidReference(reference));
        }
        Ok(Self(reference))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_s3(&self) -> bool {
        self.0.starts_with("s3://")
    }

    /// True when this reference points into `bucket`
    pub fn is_in_bucket(&self, bucket: &str) -> bool {
        let root = format!("s3://{bucket}");
        !bucket.is_empty()
            && self
                .0
                .strip_prefix(&root)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

impl TryFrom<String> for DatasetReference {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DatasetReference> for String {
    fn from(value: DatasetReference) -> Self {
        value.0
    }
}

impl fmt::Display for DatasetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DatasetReference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Key and annotations directory for one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Bucket-relative key, never starting with `/` when a prefix was stripped
    pub key: String,
    pub annotations_dir: PathBuf,
}

/// Remove `s3://{bucket}/` (or else `s3://{bucket}`) once, then one leading `/`.
///
/// A reference matching neither form is returned as-is, minus a single
/// leading `/`.
pub fn strip_bucket_prefix(reference: &str, bucket: &str) -> String {
    let with_slash = format!("s3://{bucket}/");
    let without_slash = format!("s3://{bucket}");

    let stripped = if reference.contains(&with_slash) {
        reference.replacen(&with_slash, "", 1)
    } else if reference.contains(&without_slash) {
        reference.replacen(&without_slash, "", 1)
    } else {
        reference.to_string()
    };

    match stripped.strip_prefix('/') {
        Some(rest) => rest.to_string(),
        None => stripped,
    }
}

/// Reject keys that would land outside the directory they are joined onto.
///
/// Absolute keys, drive prefixes and `..` components are refused; `.` is allowed.
pub fn check_key(key: &str) -> Result<()> {
    let escapes = Path::new(key).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(Error::UnsafeKey(key.to_string()));
    }
    Ok(())
}

/// Annotations directory for `key` under `annotation_root`
pub fn annotations_dir(annotation_root: &Path, bucket: &str, key: &str) -> PathBuf {
    let name = format!("{key}{ANNOTATIONS_SUFFIX}");
    if bucket.is_empty() {
        annotation_root.join(name)
    } else {
        annotation_root.join(bucket).join(name)
    }
}

/// Computes and creates per-dataset annotations directories
#[derive(Debug, Clone)]
pub struct PathResolver {
    annotation_root: PathBuf,
    bucket: String,
}

impl PathResolver {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(annotation_root: P, bucket: S) -> Self {
        Self {
            annotation_root: annotation_root.into(),
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Resolve without touching the filesystem
    pub fn plan(&self, reference: &DatasetReference) -> Result<ResolvedPath> {
        let key = strip_bucket_prefix(reference.as_str(), &self.bucket);
        check_key(&key)?;
        let annotations_dir = annotations_dir(&self.annotation_root, &self.bucket, &key);
        Ok(ResolvedPath {
            key,
            annotations_dir,
        })
    }

    /// Resolve and create the annotations directory if it is missing
    pub async fn resolve(&self, reference: &DatasetReference) -> Result<ResolvedPath> {
        let resolved = self.plan(reference)?;
        tokio::fs::create_dir_all(&resolved.annotations_dir)
            .await
            .map_err(|e| Error::path(&resolved.annotations_dir, e))?;

        let dir = resolved.annotations_dir.display().to_string();
        diagnostics::debug!("Annotations dir: {dir}", dir: dir);
        Ok(resolved)
    }
}
