use std::io::Write;

use annostore::{DatasetReference, S3SyncCache};
use anyhow::{Context, Result};

use crate::common::CliContext;

/// Download each reference into the local mirror and print where it landed
pub async fn fetch_command(
    ctx: &CliContext,
    references: &[String],
    out: &mut impl Write,
) -> Result<()> {
    let cache = S3SyncCache::new(&ctx.settings, ctx.transfer.clone())?;

    for reference in references {
        let parsed = DatasetReference::new(reference.as_str())?;
        let local = cache
            .ensure_local(&parsed)
            .await
            .with_context(|| format!("Failed to fetch {reference}"))?;
        writeln!(out, "{}", local.local_path.display())?;
    }

    let stats = cache.stats();
    let (misses, hits) = (stats.misses, stats.hits);
    diagnostics::debug!(
        "fetch finished with {misses} downloads and {hits} cache hits",
        misses: misses,
        hits: hits
    );
    Ok(())
}
