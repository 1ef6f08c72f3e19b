//! Periodic mirroring of the local annotations tree up to S3
//!
//! While sync is enabled the task runs `sync {local} s3://{bucket}`,
//! waits one interval, and repeats until its cancellation token fires.
//! A failed sync ends the task with that error; retrying the whole task
//! is left to whoever scheduled it.

use crate::config::Settings;
use crate::transfer::Transfer;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// How a call to [`PushTask::run`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Sync is switched off; nothing ran
    Disabled,
    /// The token fired after `iterations` successful syncs
    Cancelled { iterations: u64 },
}

pub struct PushTask {
    transfer: Arc<dyn Transfer>,
    local_dir: PathBuf,
    remote: String,
    interval: Duration,
    enabled: bool,
}

impl PushTask {
    /// A bucket is only required when sync is enabled
    pub fn new(settings: &Settings, transfer: Arc<dyn Transfer>) -> Result<Self> {
        if settings.sync_enabled {
            _ = settings.require_bucket()?;
        }
        Ok(Self {
            transfer,
            local_dir: settings.bucket_dir(),
            remote: settings.bucket_uri(),
            interval: settings.push_interval,
            enabled: settings.sync_enabled,
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Log whether sync would run, without running anything
    pub fn report_status(&self) -> bool {
        if self.enabled {
            let local = self.local_dir.display().to_string();
            let remote = &self.remote;
            diagnostics::info!(
                "Sync enabled.. sync up local: {local} with s3 {remote}",
                local: local,
                remote: remote
            );
        } else {
            diagnostics::info!("Sync not enabled. Nothing to do here");
        }
        self.enabled
    }

    /// Sync until `cancel` fires or a sync fails
    pub async fn run(&self, cancel: CancellationToken) -> Result<PushOutcome> {
        if !self.report_status() {
            return Ok(PushOutcome::Disabled);
        }
        self.prepare().await?;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut iterations = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    diagnostics::info!(
                        "Push task stopped after {iterations} syncs",
                        iterations: iterations
                    );
                    return Ok(PushOutcome::Cancelled { iterations });
                }
                _ = ticker.tick() => {
                    self.sync_up().await?;
                    iterations += 1;
                    // the next sync starts one full interval after this one finished
                    ticker.reset();
                }
            }
        }
    }

    /// One sync, or nothing when disabled. Returns whether a sync ran.
    pub async fn run_once(&self) -> Result<bool> {
        if !self.report_status() {
            return Ok(false);
        }
        self.prepare().await?;
        self.sync_up().await?;
        Ok(true)
    }

    /// Mirror the bucket into the local tree once. Returns whether a sync ran.
    pub async fn sync_down(&self) -> Result<bool> {
        if !self.enabled {
            diagnostics::info!("Sync not enabled. Nothing to do here");
            return Ok(false);
        }
        self.prepare().await?;
        let local = self.local_path_str();
        let remote = format!("{}/", self.remote);
        diagnostics::info!(
            "Sync enabled.. sync down s3 {remote} -> local {local}",
            remote: remote,
            local: local
        );
        self.transfer.sync(&remote, &local).await?;
        Ok(true)
    }

    async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.local_dir)
            .await
            .map_err(|e| Error::path(&self.local_dir, e))
    }

    async fn sync_up(&self) -> Result<()> {
        let local = self.local_path_str();
        let remote = &self.remote;
        diagnostics::debug!("Syncing {local} up to {remote}", local: local, remote: remote);
        self.transfer.sync(&local, remote).await
    }

    fn local_path_str(&self) -> String {
        self.local_dir.to_string_lossy().into_owned()
    }
}
