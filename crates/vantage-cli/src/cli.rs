//! CLI argument definitions using clap
//!
//! The command implementations live in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vantage_core::import::DEFAULT_CHUNK_SIZE;

/// Vantage - Aggregations over the insights dataset
#[derive(Parser)]
#[command(name = "vantage")]
#[command(about = "REST API and import tooling for the insights dataset", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "3008")]
        port: u16,

        /// Path the insight routes are mounted under
        #[arg(long, default_value = vantage_server::DEFAULT_BASE_PATH)]
        base_path: String,

        /// Allowed CORS origin (repeatable; any origin when omitted)
        #[arg(long = "cors-origin")]
        cors_origin: Vec<String>,
    },

    /// Import the insights dataset from CSV
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Rows per insert batch
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Print the import summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check table counts and a sample insight after an import
    Verify {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show store configuration and reachability
    Status,
}
