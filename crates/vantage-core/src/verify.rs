//! Post-import sanity check: row counts plus one fully resolved sample

use serde::Serialize;

use crate::error::Result;
use crate::models::{InsightDetail, LookupTable, Table};
use crate::store::InsightStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    /// Row count of every lookup table
    pub tables: Vec<TableCount>,
    pub total_insights: i64,
    pub sample: Option<InsightDetail>,
}

impl VerificationReport {
    /// True when insights were loaded and the sample resolved
    pub fn looks_populated(&self) -> bool {
        self.total_insights > 0 && self.sample.is_some()
    }
}

/// Count every table and fetch a sample insight with its relations
pub async fn verify_import<S: InsightStore + ?Sized>(store: &S) -> Result<VerificationReport> {
    let mut tables = Vec::with_capacity(LookupTable::ALL.len());
    for table in LookupTable::ALL {
        let count = store.count_rows(Table::Lookup(table)).await?;
        tables.push(TableCount {
            table: table.to_string(),
            count,
        });
    }

    let sample = store.sample_insight().await?;
    let total_insights = store.count_rows(Table::Insights).await?;

    Ok(VerificationReport {
        tables,
        total_insights,
        sample,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NamedRef, NewInsight};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_verify_empty_store() {
        let store = MemoryStore::new();
        let report = verify_import(&store).await.unwrap();

        assert_eq!(report.tables.len(), 6);
        assert!(report.tables.iter().all(|t| t.count == 0));
        assert_eq!(report.total_insights, 0);
        assert!(!report.looks_populated());
    }

    #[tokio::test]
    async fn test_verify_populated_store() {
        let store = MemoryStore::new();
        let topic = store.add_lookup(LookupTable::Topics, "gas");
        store.add_lookup(LookupTable::Topics, "oil");
        store.add(NewInsight {
            topic_id: Some(topic),
            title: Some("Gas demand".into()),
            ..Default::default()
        });

        let report = verify_import(&store).await.unwrap();
        let topics = report.tables.iter().find(|t| t.table == "topics").unwrap();
        assert_eq!(topics.count, 2);
        assert_eq!(report.total_insights, 1);
        assert_eq!(
            report.sample.as_ref().and_then(|s| s.topic.clone()),
            Some(NamedRef::new("gas"))
        );
        assert!(report.looks_populated());
    }

    #[tokio::test]
    async fn test_verify_surfaces_store_errors() {
        let store = MemoryStore::failing("boom");
        assert!(verify_import(&store).await.is_err());
    }
}
