use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use dataset::{AppContext, DataAdaptor, Dataset, DatasetSelection, SessionState};
use serde::Serialize;

use crate::common::CliContext;

#[derive(Args, Debug, Default)]
pub struct OpenArgs {
    /// Dataset path or `s3://` URI to bind
    #[arg(long)]
    pub dataset: Option<String>,

    /// Annotation CSV to download and use instead of the annotations directory
    #[arg(long)]
    pub csv: Option<String>,

    /// Session payload as JSON (`adata_path`, `csv`, `dataset`); flags override it
    #[arg(long)]
    pub session: Option<String>,

    /// Treat --dataset and --csv as picker form values (`bucket/key`) for this view
    #[arg(long)]
    pub view_type: Option<String>,
}

#[derive(Serialize)]
struct OpenReport<'a> {
    found: bool,
    path: &'a str,
    redirect: Option<&'a str>,
    adaptor: Option<&'a DataAdaptor>,
    demo: Option<&'a str>,
}

/// Bind a session to its dataset the way a request handler would and print the result as JSON
pub async fn open_command(ctx: &CliContext, args: &OpenArgs, out: &mut impl Write) -> Result<()> {
    let mut session = match &args.session {
        Some(json) => SessionState::from_json(json)?,
        None => SessionState::default(),
    };

    let redirect = match &args.view_type {
        Some(view_type) => session.apply_selection(&DatasetSelection {
            view_type: view_type.clone(),
            dataset: args.dataset.clone(),
            csv: args.csv.clone(),
        })?,
        None => {
            if args.dataset.is_some() {
                session.dataset_path = args.dataset.clone();
            }
            if args.csv.is_some() {
                session.csv_path = args.csv.clone();
            }
            None
        }
    };

    let app = AppContext::new(ctx.settings.clone(), ctx.transfer.clone())?;
    let binding = app.load_for_request(&session).await.map_err(|e| {
        let status = e.http_status();
        anyhow::Error::new(e).context(format!("Request would fail with status {status}"))
    })?;

    let demo = match &binding.dataset {
        Dataset::Demo(name) => Some(*name),
        Dataset::Loaded(_) => None,
    };
    let report = OpenReport {
        found: binding.found,
        path: &binding.path,
        redirect,
        adaptor: binding.handle.as_deref(),
        demo,
    };
    serde_json::to_writer_pretty(&mut *out, &report).context("Failed to write report")?;
    writeln!(out)?;
    Ok(())
}
