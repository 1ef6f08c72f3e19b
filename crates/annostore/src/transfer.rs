//! S3 transfers through the `aws` command line tool
//!
//! Every call runs one child process to completion with captured
//! output. A non-zero exit is a `TransferFailed` error; nothing here
//! retries.

use crate::{Error, Result};
use async_trait::async_trait;
use std::process::Output;
use tokio::process::Command;

/// Object transfer operations used by the sync cache, the push task and the catalog
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Copy a single object, `aws s3 cp <src> <dst>`
    async fn copy(&self, src: &str, dst: &str) -> Result<()>;

    /// Mirror a directory tree, `aws s3 sync <src> <dst>`
    async fn sync(&self, src: &str, dst: &str) -> Result<()>;

    /// Recursive listing text, `aws s3 ls <uri> --recursive`
    async fn list(&self, uri: &str) -> Result<String>;
}

/// `Transfer` backed by the `aws` CLI
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    region: String,
}

impl AwsCli {
    pub fn new<P: Into<String>, R: Into<String>>(program: P, region: R) -> Self {
        Self {
            program: program.into(),
            region: region.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        let command = format!("{} {}", self.program, args.join(" "));
        diagnostics::debug!("Running command: {command}", command: command);

        let output = Command::new(&self.program)
            .args(args)
            .env("AWS_DEFAULT_REGION", &self.region)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let status = match output.status.code() {
                Some(code) => format!("exit code {code}"),
                None => "a signal".to_string(),
            };
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            diagnostics::error!(
                "Command failed: {command} ({status}): {stderr}",
                command: command,
                status: status,
                stderr: stderr
            );
            return Err(Error::TransferFailed {
                command,
                status,
                stderr,
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl Transfer for AwsCli {
    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        _ = self.run(&["s3", "cp", src, dst]).await?;
        Ok(())
    }

    async fn sync(&self, src: &str, dst: &str) -> Result<()> {
        _ = self.run(&["s3", "sync", src, dst]).await?;
        Ok(())
    }

    async fn list(&self, uri: &str) -> Result<String> {
        let output = self.run(&["s3", "ls", uri, "--recursive"]).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
