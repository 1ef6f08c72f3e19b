use std::io::Write;
use std::time::Duration;

use annostore::{PushOutcome, PushTask};
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::common::{CliContext, parse_interval};

#[derive(Args, Debug, Default)]
pub struct SyncUpArgs {
    /// Run a single sync and exit
    #[arg(long)]
    pub once: bool,

    /// Time between syncs, e.g. `5s` or `1m`
    #[arg(long, value_parser = parse_interval)]
    pub interval: Option<Duration>,

    /// Job retries after a failed run
    #[arg(long)]
    pub retries: Option<usize>,

    /// Delay before each retry, e.g. `5m`
    #[arg(long, value_parser = parse_interval)]
    pub retry_delay: Option<Duration>,
}

/// Push the local annotations tree to the bucket until interrupted
pub async fn sync_up_command(
    ctx: &CliContext,
    args: &SyncUpArgs,
    out: &mut impl Write,
) -> Result<()> {
    let mut settings = ctx.settings.clone();
    if let Some(interval) = args.interval {
        settings.push_interval = interval;
    }
    if let Some(retries) = args.retries {
        settings.retries = retries;
    }
    if let Some(delay) = args.retry_delay {
        settings.retry_delay = delay;
    }
    settings.validate()?;

    let task = PushTask::new(&settings, ctx.transfer.clone())?;

    if args.once {
        let ran = task.run_once().await.context("Sync up failed")?;
        writeln!(out, "{}", if ran { "synced" } else { "sync disabled" })?;
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            diagnostics::info!("Interrupted, stopping push task");
            on_interrupt.cancel();
        }
    });

    let outcome = run_with_retry(&task, &cancel, settings.retries, settings.retry_delay)
        .await
        .context("Push task failed")?;

    match outcome {
        PushOutcome::Disabled => writeln!(out, "sync disabled")?,
        PushOutcome::Cancelled { iterations } => writeln!(out, "stopped after {iterations} syncs")?,
    }
    Ok(())
}

/// Run the push task, restarting it up to `retries` times after `delay` when a sync fails.
///
/// Cancelling during the delay restarts the task at once, which then stops without syncing.
pub async fn run_with_retry(
    task: &PushTask,
    cancel: &CancellationToken,
    retries: usize,
    delay: Duration,
) -> annostore::Result<PushOutcome> {
    let policy = ConstantBuilder::default()
        .with_delay(delay)
        .with_max_times(retries);

    let interrupt = cancel.clone();
    (|| task.run(cancel.clone()))
        .retry(policy)
        .sleep(move |delay: Duration| {
            let interrupt = interrupt.clone();
            async move {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = interrupt.cancelled() => {}
                }
            }
        })
        .when(|_| !cancel.is_cancelled())
        .notify(|e: &annostore::Error, after: Duration| {
            let reason = e.to_string();
            let secs = after.as_secs();
            diagnostics::warn!(
                "Push task failed: {reason}; retrying in {secs}s",
                reason: reason,
                secs: secs
            );
        })
        .await
}

/// Mirror the bucket into the local annotations tree once
pub async fn sync_down_command(ctx: &CliContext, out: &mut impl Write) -> Result<()> {
    let task = PushTask::new(&ctx.settings, ctx.transfer.clone())?;
    let ran = task.sync_down().await.context("Sync down failed")?;
    writeln!(out, "{}", if ran { "synced" } else { "sync disabled" })?;
    Ok(())
}

/// Report whether sync is enabled and what it would mirror
pub fn sync_test_command(ctx: &CliContext, out: &mut impl Write) -> Result<()> {
    let task = PushTask::new(&ctx.settings, ctx.transfer.clone())?;
    if task.report_status() {
        writeln!(
            out,
            "sync enabled: {} -> {}",
            task.local_dir().display(),
            task.remote()
        )?;
    } else {
        writeln!(out, "sync disabled")?;
    }
    Ok(())
}
