use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cmd::commands;
use cmd::common::CliContext;

/// Celldock fetches single-cell datasets from S3, binds them to viewer
/// sessions, and keeps the user annotations tree mirrored in the bucket.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "celldock")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML file overriding settings read from the environment
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the bucket key and annotations directory for a dataset
    Resolve {
        reference: String,

        /// Compute without creating the directory
        #[arg(long)]
        dry_run: bool,
    },

    /// Download objects into the local mirror, once per reference
    Fetch {
        #[arg(required = true)]
        references: Vec<String>,
    },

    /// List datasets and annotation CSVs in the bucket
    #[clap(visible_alias = "ls")]
    List {
        #[arg(long)]
        json: bool,
    },

    /// Bind a session to its dataset and report the result
    Open(commands::OpenArgs),

    /// Push the local annotations tree to the bucket periodically
    SyncUp(commands::SyncUpArgs),

    /// Mirror the bucket into the local annotations tree once
    SyncDown,

    /// Report whether sync is enabled
    SyncTest,

    /// Print the effective configuration as YAML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    diagnostics::init_diagnostics();

    let cli = Cli::parse();
    let ctx = CliContext::load(cli.config.as_deref())?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::Resolve { reference, dry_run } => {
            commands::resolve_command(&ctx, reference, *dry_run, &mut out).await
        }
        Commands::Fetch { references } => commands::fetch_command(&ctx, references, &mut out).await,
        Commands::List { json } => commands::list_command(&ctx, *json, &mut out).await,
        Commands::Open(args) => commands::open_command(&ctx, args, &mut out).await,
        Commands::SyncUp(args) => commands::sync_up_command(&ctx, args, &mut out).await,
        Commands::SyncDown => commands::sync_down_command(&ctx, &mut out).await,
        Commands::SyncTest => commands::sync_test_command(&ctx, &mut out),
        Commands::ShowConfig => commands::show_config_command(&ctx, &mut out),
    }?;

    out.flush()?;
    Ok(())
}
