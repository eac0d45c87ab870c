//! clauselens - contract document analysis service.
//!
//! Uploads contract documents, runs an LLM-backed review pipeline over
//! them, and serves the structured results over a JSON API.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clauselens::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "clauselens=info"
    } else {
        "clauselens=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
