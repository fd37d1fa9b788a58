//! Vantage CLI - Insights dataset API
//!
//! Usage:
//!   vantage serve --port 3008        Start the API server
//!   vantage import --file data.csv   Load the dataset into the store
//!   vantage verify                   Check row counts after an import
//!   vantage status                   Show store configuration and reachability
//!
//! The store is configured through VANTAGE_STORE_URL and VANTAGE_STORE_KEY,
//! read from the environment or a local .env file.

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            base_path,
            cors_origin,
        } => {
            let store = commands::open_store()?;
            commands::cmd_serve(store, &host, port, &base_path, cors_origin).await
        }
        Commands::Import {
            file,
            chunk_size,
            json,
        } => {
            let store = commands::open_store()?;
            commands::cmd_import(&store, &file, chunk_size, json)
                .await
                .map(|_| ())
        }
        Commands::Verify { json } => {
            let store = commands::open_store()?;
            let report = commands::cmd_verify(&store, json).await?;
            if !report.looks_populated() {
                anyhow::bail!("Store looks empty; run `vantage import` first");
            }
            Ok(())
        }
        Commands::Status => {
            let store = commands::open_store()?;
            commands::cmd_status(&store).await
        }
    }
}
