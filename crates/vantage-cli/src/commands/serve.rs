//! Server command implementation

use anyhow::{Context, Result};
use vantage_core::store::{InsightStore, StoreClient};
use vantage_server::ServerConfig;

pub async fn cmd_serve(
    store: StoreClient,
    host: &str,
    port: u16,
    base_path: &str,
    cors_origins: Vec<String>,
) -> Result<()> {
    println!("🚀 Starting Vantage API server...");
    println!("   Store: {}", store.describe());
    println!("   Listening: http://{}:{}{}", host, port, base_path);
    if cors_origins.is_empty() {
        println!("   CORS: any origin");
    } else {
        println!("   CORS: {}", cors_origins.join(", "));
    }

    let config = ServerConfig {
        base_path: base_path.to_string(),
        allowed_origins: cors_origins,
    };

    vantage_server::serve_with_config(store, host, port, config)
        .await
        .context("Server error")
}
