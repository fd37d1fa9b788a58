//! Store status command

use anyhow::Result;
use vantage_core::models::Table;
use vantage_core::store::{InsightStore, StoreClient};

/// Print the configured backend and whether it answers
///
/// An unreachable store is an error so the process exits non-zero.
pub async fn cmd_status(store: &StoreClient) -> Result<()> {
    println!();
    println!("📊 Vantage Status");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Store: {}", store.describe());

    let healthy = store.health_check().await;
    if !healthy {
        println!("   ❌ Store is not responding");
        println!();
        anyhow::bail!("Store is not responding: {}", store.describe());
    }
    println!("   ✅ Store is responding");

    match store.count_rows(Table::Insights).await {
        Ok(count) => println!("   Insights: {}", count),
        Err(e) => println!("   ⚠️  Could not count insights: {}", e),
    }
    println!();

    Ok(())
}
