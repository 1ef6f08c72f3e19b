use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use annostore::{AwsCli, Settings, Transfer};
use anyhow::{Context, Result};

/// Settings and the S3 transfer shared by every subcommand
pub struct CliContext {
    pub settings: Settings,
    pub transfer: Arc<dyn Transfer>,
}

impl CliContext {
    /// Environment settings, overlaid by `config` when given, transferring through the aws CLI
    pub fn load(config: Option<&Path>) -> Result<Self> {
        let mut settings = Settings::from_env()
            .context("Failed to read settings from environment")?;
        if let Some(path) = config {
            settings = settings
                .with_file(path)
                .with_context(|| format!("Failed to apply config file {}", path.display()))?;
        }
        let transfer = Arc::new(AwsCli::new(settings.aws_bin.clone(), settings.region.clone()));
        Ok(Self::new(settings, transfer))
    }

    pub fn new(settings: Settings, transfer: Arc<dyn Transfer>) -> Self {
        Self { settings, transfer }
    }
}

/// clap value parser for human durations such as `30s` or `5m`
pub fn parse_interval(s: &str) -> std::result::Result<Duration, String> {
    let d = parse_duration::parse(s).map_err(|e| e.to_string())?;
    if d.is_zero() {
        return Err("interval must be greater than 0".to_string());
    }
    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_interval("2 minutes"), Ok(Duration::from_secs(120)));
        assert!(parse_interval("0s").is_err());
        assert!(parse_interval("soon").is_err());
    }
}
