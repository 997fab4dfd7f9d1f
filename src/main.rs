use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docdex::{config, logging, pipeline::IndexPipeline};

#[derive(Parser)]
#[command(
    name = "docdex",
    about = "Indexes local documents into a Qdrant collection for semantic search"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover, embed, and upload documents beneath a root path.
    Index {
        /// Document root: a directory tree or a single file.
        #[arg(long)]
        root: PathBuf,
        /// Drop every indexed record first and re-index from scratch.
        #[arg(long)]
        force_reset: bool,
    },
    /// Purge files from the index and the tracker, e.g. after deleting them.
    Cleanup {
        /// Document root the files were indexed under.
        #[arg(long)]
        root: PathBuf,
        /// Files to purge, by the paths they were indexed with.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show tracker and index state for a document root.
    Status {
        /// Document root to inspect.
        #[arg(long)]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    config::init_config().context("configuration is incomplete")?;
    logging::init_tracing();
    let pipeline = IndexPipeline::new().context("failed to initialize the indexing pipeline")?;

    match cli.command {
        Command::Index { root, force_reset } => {
            let summary = pipeline.run(&root, force_reset).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if summary.failed > 0 {
                bail!("{} file(s) failed to index", summary.failed);
            }
        }
        Command::Cleanup { root, files } => {
            let summary = pipeline.force_cleanup(&root, &files).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Status { root } => {
            let report = pipeline.status(&root).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
