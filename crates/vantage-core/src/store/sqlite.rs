//! `InsightStore` over the embedded database
//!
//! rusqlite is blocking, so every query runs on the blocking thread pool
//! against a clone of the (pool-backed) database handle.

use async_trait::async_trait;

use super::InsightStore;
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    Insight, InsightDetail, LikelihoodIntensityRow, LookupEntry, LookupTable, NewInsight, Page,
    PageRequest, RelevanceLikelihoodRow, Table,
};

impl Database {
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }
}

#[async_trait]
impl InsightStore for Database {
    async fn list_insights(&self, request: &PageRequest) -> Result<Page<Insight>> {
        let request = *request;
        self.blocking(move |db| db.list_insights_page(&request))
            .await
    }

    async fn sector_names(&self) -> Result<Vec<String>> {
        self.blocking(|db| db.list_sector_names()).await
    }

    async fn region_names(&self) -> Result<Vec<String>> {
        self.blocking(|db| db.list_region_names()).await
    }

    async fn added_dates(&self) -> Result<Vec<String>> {
        self.blocking(|db| db.list_added_dates()).await
    }

    async fn likelihood_intensity(&self) -> Result<Vec<LikelihoodIntensityRow>> {
        self.blocking(|db| db.list_likelihood_intensity()).await
    }

    async fn relevance_likelihood(&self) -> Result<Vec<RelevanceLikelihoodRow>> {
        self.blocking(|db| db.list_relevance_likelihood()).await
    }

    async fn upsert_lookup(
        &self,
        table: LookupTable,
        names: &[String],
    ) -> Result<Vec<LookupEntry>> {
        let names = names.to_vec();
        self.blocking(move |db| db.upsert_lookup_names(table, &names))
            .await
    }

    async fn insert_insights(&self, rows: &[NewInsight]) -> Result<usize> {
        let rows = rows.to_vec();
        self.blocking(move |db| db.insert_insight_batch(&rows)).await
    }

    async fn count_rows(&self, table: Table) -> Result<i64> {
        self.blocking(move |db| db.count_table_rows(table)).await
    }

    async fn sample_insight(&self) -> Result<Option<InsightDetail>> {
        self.blocking(|db| db.get_sample_insight()).await
    }

    async fn health_check(&self) -> bool {
        match self.blocking(|db| db.ping()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "SQLite health check failed");
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("sqlite ({})", self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_as_store() {
        let db = Database::in_memory().unwrap();
        assert!(db.health_check().await);

        let sectors = db
            .upsert_lookup(LookupTable::Sectors, &["Energy".to_string()])
            .await
            .unwrap();
        let inserted = db
            .insert_insights(&[NewInsight {
                sector_id: Some(sectors[0].id),
                relevance: Some(3),
                likelihood: Some(4),
                ..Default::default()
            }])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        assert_eq!(db.sector_names().await.unwrap(), vec!["Energy".to_string()]);
        assert_eq!(db.relevance_likelihood().await.unwrap().len(), 1);
        assert_eq!(db.count_rows(Table::Insights).await.unwrap(), 1);
        assert!(db.describe().starts_with("sqlite ("));
    }
}
