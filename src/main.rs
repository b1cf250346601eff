//! # kb-sync CLI (`kbsync`)
//!
//! ## Usage
//!
//! ```bash
//! kbsync --config ./config/kbsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbsync names` | Print the resource names derived from the suffix |
//! | `kbsync identity` | Show the AWS principal in use |
//! | `kbsync provision` | Create or find the collection and vector index |
//! | `kbsync sync` | Provision, create or reuse the knowledge base, ingest, record |
//! | `kbsync query "<text>"` | Retrieve passages from the knowledge base |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kb_sync::progress::ProgressMode;
use kb_sync::{config, identity, names, provision, query, sync};

/// kb-sync CLI: provision a vector store and sync a RAG knowledge base.
#[derive(Parser)]
#[command(
    name = "kbsync",
    about = "Provision a managed vector store and keep a RAG knowledge base in sync",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kbsync.toml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every resource name derived from the configured suffix.
    Names,

    /// Show the account and ARN the credentials resolve to.
    Identity,

    /// Create the vector-search collection and index, reusing existing ones.
    Provision,

    /// Run the full workflow: provision, knowledge base, data source,
    /// ingestion job, and run record.
    ///
    /// Safe to rerun; existing resources are found by name and reused.
    Sync {
        /// Print the plan without reading credentials or calling AWS.
        #[arg(long)]
        dry_run: bool,

        /// Ingestion progress on stderr. Defaults to `human` on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Retrieve passages from the knowledge base.
    Query {
        /// Query text.
        query: String,

        /// Maximum number of results.
        #[arg(long, default_value = "5")]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level. Logs go to stderr; stdout is for results.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Names => names::run_names(&cfg),
        Commands::Identity => identity::run_identity(&cfg).await?,
        Commands::Provision => provision::run_provision(&cfg).await?,
        Commands::Sync { dry_run, progress } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            sync::run_sync(&cfg, dry_run, mode).await?;
        }
        Commands::Query { query: text, limit } => query::run_query(&cfg, &text, limit).await?,
    }

    Ok(())
}
