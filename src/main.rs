mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use relfs::config::RelfsConfig;
use relfs::search::QueryMode;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relfs", version, about = "Relation store and virtual filesystem for AI-generated tools")]
struct Cli {
    /// Data directory (overrides config and RELFS_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to ~/.relfs/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server
    Serve {
        /// Transport: stdio or sse (overrides config)
        #[arg(long)]
        transport: Option<String>,
    },
    /// Check database health
    Doctor,
    /// List a virtual directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Show type and update time
        #[arg(short, long)]
        long: bool,
    },
    /// Print a virtual file
    Cat {
        path: String,
        /// Print the relation's properties instead of its content
        #[arg(long)]
        info: bool,
    },
    /// Search relations by keyword
    Search {
        #[arg(required = true)]
        terms: Vec<String>,
        /// or, and, phrase
        #[arg(long, default_value = "or")]
        mode: QueryMode,
        #[arg(long)]
        limit: Option<usize>,
        /// Only results above the configured relevance threshold
        #[arg(long)]
        relevant: bool,
    },
    /// Show relation store statistics
    Stats,
    /// Rebuild the path and search indexes from stored relations
    RebuildIndex,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RelfsConfig::load_from(path)?,
        None => RelfsConfig::load()?,
    };
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.to_string_lossy().into_owned();
    }

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { transport } => {
            if let Some(transport) = transport {
                config.server.transport = transport;
            }
            relfs::server::serve(config).await?;
        }
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Ls { path, long } => cli::ls::ls(&config, &path, long)?,
        Command::Cat { path, info } => cli::cat::cat(&config, &path, info)?,
        Command::Search {
            terms,
            mode,
            limit,
            relevant,
        } => cli::search::search(&config, &terms, mode, limit, relevant)?,
        Command::Stats => cli::stats::stats(&config)?,
        Command::RebuildIndex => cli::rebuild::rebuild_index(&config)?,
    }

    Ok(())
}
