//! Post-import verification command

use anyhow::{Context, Result};
use tracing::{info, warn};
use vantage_core::store::StoreClient;
use vantage_core::verify::{verify_import, VerificationReport};

fn name_or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

pub async fn cmd_verify(store: &StoreClient, json: bool) -> Result<VerificationReport> {
    let report = verify_import(store)
        .await
        .context("Failed to verify store contents")?;

    if report.looks_populated() {
        info!(insights = report.total_insights, "Verification passed");
    } else {
        warn!("Verification found no insights");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    println!("🔎 Verifying imported data...");
    for table in &report.tables {
        println!("   {:<10} {}", table.table, table.count);
    }
    println!("   {:<10} {}", "insights", report.total_insights);

    match &report.sample {
        Some(sample) => {
            println!();
            println!("   Sample insight #{}", sample.id);
            println!("     Title:   {}", name_or_dash(sample.title.as_deref()));
            println!(
                "     Sector:  {}",
                name_or_dash(sample.sector.as_ref().map(|s| s.name.as_str()))
            );
            println!(
                "     Region:  {}",
                name_or_dash(sample.region.as_ref().map(|r| r.name.as_str()))
            );
            println!(
                "     Country: {}",
                name_or_dash(sample.country.as_ref().map(|c| c.name.as_str()))
            );
            println!(
                "     Topic:   {}",
                name_or_dash(sample.topic.as_ref().map(|t| t.name.as_str()))
            );
            println!(
                "     PESTLE:  {}",
                name_or_dash(sample.pestle.as_ref().map(|p| p.name.as_str()))
            );
            println!(
                "     Source:  {}",
                name_or_dash(sample.source.as_ref().map(|s| s.name.as_str()))
            );
        }
        None => println!("   ⚠️  No insights found"),
    }

    Ok(report)
}
