//! Process settings read from the environment, with an optional YAML overlay

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_CACHE_CAPACITY: usize = 10;
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RETRIES: usize = 1;

/// Everything the caches, resolver and push task need to know
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Bucket name without scheme; empty when running against local files only
    pub bucket: String,

    /// Absolute root of the local annotations tree (`ANNOTATION_DIR`)
    pub annotation_root: PathBuf,

    pub region: String,

    pub sync_enabled: bool,

    /// Serve every view without a permission check (`PUBLIC`)
    pub public: bool,

    /// Reverse-proxy path prefix (`SCRIPT_NAME`)
    pub script_name: Option<String>,

    /// Program used for S3 transfers
    pub aws_bin: String,

    pub cache_capacity: usize,

    #[serde(with = "duration_secs")]
    pub push_interval: Duration,

    /// Job-level retries of the push task
    pub retries: usize,

    #[serde(with = "duration_secs")]
    pub retry_delay: Duration,
}

/// Optional overrides loaded from YAML; absent keys keep the environment value
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub bucket: Option<String>,
    pub annotation_root: Option<PathBuf>,
    pub region: Option<String>,
    pub sync_enabled: Option<bool>,
    pub public: Option<bool>,
    pub script_name: Option<String>,
    pub aws_bin: Option<String>,
    pub cache_capacity: Option<usize>,
    pub push_interval_secs: Option<u64>,
    pub retries: Option<usize>,
    pub retry_delay_secs: Option<u64>,
}

/// URL prefixes handed to a mounted dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PathnameParams {
    pub url_base_pathname: Option<String>,
    pub routes_pathname_prefix: Option<String>,
    pub requests_pathname_prefix: Option<String>,
}

impl Settings {
    /// Build settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; used by `from_env` and by tests
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let bucket = non_empty("CELLXGENE_BUCKET")
            .or_else(|| non_empty("BUCKET"))
            .unwrap_or_default();

        let annotation_root = match non_empty("ANNOTATION_DIR") {
            Some(dir) => absolute(PathBuf::from(dir))?,
            None => absolute(PathBuf::from("annotations"))?,
        };

        let settings = Settings {
            bucket,
            annotation_root,
            region: non_empty("AWS_DEFAULT_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            sync_enabled: lookup("SYNC_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            public: lookup("PUBLIC").is_some_and(|v| parse_flag(&v)),
            script_name: non_empty("SCRIPT_NAME"),
            aws_bin: non_empty("CELLDOCK_AWS_BIN").unwrap_or_else(|| "aws".to_string()),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            push_interval: DEFAULT_PUSH_INTERVAL,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Read a YAML overlay file and apply it on top of these settings
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::path(path, e))?;
        let overlay: SettingsFile = serde_yaml_ng::from_str(&content)?;
        self.with_overlay(overlay)
    }

    pub fn with_overlay(mut self, overlay: SettingsFile) -> Result<Self> {
        if let Some(bucket) = overlay.bucket {
            self.bucket = bucket;
        }
        if let Some(root) = overlay.annotation_root {
            self.annotation_root = absolute(root)?;
        }
        if let Some(region) = overlay.region {
            self.region = region;
        }
        if let Some(enabled) = overlay.sync_enabled {
            self.sync_enabled = enabled;
        }
        if let Some(public) = overlay.public {
            self.public = public;
        }
        if overlay.script_name.is_some() {
            self.script_name = overlay.script_name;
        }
        if let Some(bin) = overlay.aws_bin {
            self.aws_bin = bin;
        }
        if let Some(capacity) = overlay.cache_capacity {
            self.cache_capacity = capacity;
        }
        if let Some(secs) = overlay.push_interval_secs {
            self.push_interval = Duration::from_secs(secs);
        }
        if let Some(retries) = overlay.retries {
            self.retries = retries;
        }
        if let Some(secs) = overlay.retry_delay_secs {
            self.retry_delay = Duration::from_secs(secs);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(Error::configuration("cache_capacity must be greater than 0"));
        }
        if self.push_interval.is_zero() {
            return Err(Error::configuration("push_interval must be greater than 0"));
        }
        if self.bucket.contains('/') {
            return Err(Error::configuration(format!(
                "bucket must be a bare name, got {:?}",
                self.bucket
            )));
        }
        if self.region.is_empty() {
            return Err(Error::configuration("region cannot be empty"));
        }
        Ok(())
    }

    /// `{annotation_root}/{bucket}`: where synced objects land and what the push task mirrors
    pub fn bucket_dir(&self) -> PathBuf {
        if self.bucket.is_empty() {
            self.annotation_root.clone()
        } else {
            self.annotation_root.join(&self.bucket)
        }
    }

    /// `s3://{bucket}`
    pub fn bucket_uri(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    /// Fails when no bucket is configured
    pub fn require_bucket(&self) -> Result<&str> {
        if self.bucket.is_empty() {
            Err(Error::configuration("no bucket configured (set CELLXGENE_BUCKET or BUCKET)"))
        } else {
            Ok(&self.bucket)
        }
    }

    /// Prefixes for a dashboard mounted at `url_base`, honoring `SCRIPT_NAME`
    pub fn pathname_params(&self, url_base: &str) -> PathnameParams {
        match &self.script_name {
            Some(script_name) => PathnameParams {
                url_base_pathname: None,
                routes_pathname_prefix: Some(url_base.to_string()),
                requests_pathname_prefix: Some(format!(
                    "{}{}",
                    script_name.trim_end_matches('/'),
                    url_base
                )),
            },
            None => PathnameParams {
                url_base_pathname: Some(url_base.to_string()),
                ..PathnameParams::default()
            },
        }
    }
}

/// `true`, `1` and `yes` (any case) enable a flag; everything else disables it
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}
