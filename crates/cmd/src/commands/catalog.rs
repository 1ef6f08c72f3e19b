use std::io::Write;

use annostore::list_catalog;
use anyhow::{Context, Result};

use crate::common::CliContext;

/// List the `.h5ad` datasets and `.csv` annotation files in the bucket
pub async fn list_command(ctx: &CliContext, json: bool, out: &mut impl Write) -> Result<()> {
    let bucket = ctx.settings.require_bucket()?;
    let catalog = list_catalog(ctx.transfer.as_ref(), bucket)
        .await
        .with_context(|| format!("Failed to list s3://{bucket}"))?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &catalog)?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "datasets:")?;
    for dataset in &catalog.datasets {
        writeln!(out, "  {dataset}")?;
    }
    writeln!(out, "csvs:")?;
    for csv in &catalog.csvs {
        writeln!(out, "  {csv}")?;
    }
    Ok(())
}
