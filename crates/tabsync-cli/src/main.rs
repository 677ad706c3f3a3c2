mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tabsync",
    version,
    about = "Incremental spreadsheet-to-SQL bulk loader"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline: diff the catalog, load new files, reconcile
    Run {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Clear the catalog first; every candidate file becomes new
        #[arg(long)]
        delete_catalog: bool,
    },
    /// Validate pipeline configuration and collaborator connectivity
    Check {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
    },
    /// Show or clear the processed-file catalog
    Catalog {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Overwrite the catalog with an empty set (irreversible)
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run {
            pipeline,
            delete_catalog,
        } => commands::run::execute(&pipeline, delete_catalog).await,
        Commands::Check { pipeline } => commands::check::execute(&pipeline).await,
        Commands::Catalog { pipeline, clear } => commands::catalog::execute(&pipeline, clear),
    }
}
