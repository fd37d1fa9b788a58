//! CSV import command

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};
use vantage_core::import::{parse_csv, ImportStats, Importer};
use vantage_core::store::{InsightStore, StoreClient};

pub async fn cmd_import(
    store: &StoreClient,
    file: &Path,
    chunk_size: usize,
    json: bool,
) -> Result<ImportStats> {
    let csv_file =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;
    let dataset = parse_csv(csv_file)
        .with_context(|| format!("Failed to parse CSV: {}", file.display()))?;

    if !json {
        println!("📥 Importing {} into {}...", file.display(), store.describe());
        println!("   Found {} records", dataset.records.len());
    }

    let stats = Importer::new(store)
        .with_chunk_size(chunk_size)
        .run(&dataset)
        .await
        .context("Import failed")?;

    info!(
        file = %file.display(),
        records = stats.records,
        inserted = stats.inserted,
        "Import finished"
    );
    if stats.failed_chunks > 0 {
        warn!(
            failed_chunks = stats.failed_chunks,
            "Some insight batches were not written"
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(stats);
    }

    for (table, count) in &stats.lookups {
        println!("   {:<10} {} distinct", table, count);
    }
    println!("   Inserted: {} of {}", stats.inserted, stats.records);
    if stats.unparsed_dates > 0 {
        println!("   ⚠️  Unparseable dates stored as empty: {}", stats.unparsed_dates);
    }
    if stats.failed_chunks > 0 {
        println!("   ⚠️  Failed batches: {} (see log)", stats.failed_chunks);
    } else {
        println!("✅ Import complete");
    }

    Ok(stats)
}
