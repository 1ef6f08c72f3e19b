use std::io::Write;

use annostore::{DatasetReference, PathResolver};
use anyhow::{Context, Result};

use crate::common::CliContext;

/// Print the bucket key and annotations directory for `reference`
///
/// The directory is created unless `dry_run` is set.
pub async fn resolve_command(
    ctx: &CliContext,
    reference: &str,
    dry_run: bool,
    out: &mut impl Write,
) -> Result<()> {
    let reference = DatasetReference::new(reference)?;
    let resolver = PathResolver::new(
        ctx.settings.annotation_root.clone(),
        ctx.settings.bucket.clone(),
    );

    let resolved = if dry_run {
        resolver
            .plan(&reference)
            .with_context(|| format!("Failed to resolve {reference}"))?
    } else {
        resolver
            .resolve(&reference)
            .await
            .with_context(|| format!("Failed to resolve {reference}"))?
    };

    writeln!(out, "key: {}", resolved.key)?;
    writeln!(out, "annotations: {}", resolved.annotations_dir.display())?;
    Ok(())
}
