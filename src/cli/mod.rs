//! CLI parser and command dispatch.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Parser)]
#[command(name = "clens")]
#[command(about = "Contract document analysis service")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the database and stored documents
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Owner id operations run as
    #[arg(long, global = true, default_value = "local")]
    owner: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the JSON API server and analysis workers
    Serve {
        /// Host to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Upload a local file into the document store
    Ingest {
        /// File to ingest
        path: PathBuf,
        /// Display name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Analyze a document and wait for the result
    Analyze {
        /// Document id
        document_id: String,
        /// Re-run even if an analysis already exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show a document's processing status and queue state
    Status {
        /// Document id
        document_id: String,
    },

    /// List documents
    List,

    /// Delete a document and its analysis
    Delete {
        /// Document id
        document_id: String,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load_with_data_dir(cli.config.as_deref(), cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            crate::server::serve(&settings, &host, port).await
        }
        Commands::Ingest { path, name } => commands::ingest(&settings, &cli.owner, &path, name),
        Commands::Analyze { document_id, force } => {
            commands::analyze(&settings, &cli.owner, &document_id, force).await
        }
        Commands::Status { document_id } => commands::status(&settings, &cli.owner, &document_id),
        Commands::List => commands::list(&settings, &cli.owner),
        Commands::Delete { document_id } => commands::delete(&settings, &cli.owner, &document_id),
    }
}
