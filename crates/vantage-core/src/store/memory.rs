//! In-process store for tests
//!
//! Mirrors the SQLite store: lookup names are unique per table, foreign keys
//! must point at existing lookup rows, and reads resolve names like a
//! LEFT JOIN. A failing store returns `Error::Store` from every operation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::InsightStore;
use crate::error::{Error, Result};
use crate::models::{
    Insight, InsightDetail, LikelihoodIntensityRow, LookupEntry, LookupTable, NamedRef,
    NewInsight, Page, PageRequest, RelevanceLikelihoodRow, Table,
};

#[derive(Debug, Default)]
struct MemoryData {
    lookups: HashMap<LookupTable, Vec<LookupEntry>>,
    insights: Vec<(i64, NewInsight)>,
    next_insight_id: i64,
}

impl MemoryData {
    fn lookup_name(&self, table: LookupTable, id: Option<i64>) -> Option<String> {
        let id = id?;
        self.lookups
            .get(&table)?
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.name.clone())
    }

    fn lookup_exists(&self, table: LookupTable, id: Option<i64>) -> bool {
        match id {
            None => true,
            Some(id) => self
                .lookups
                .get(&table)
                .is_some_and(|entries| entries.iter().any(|e| e.id == id)),
        }
    }

    fn upsert(&mut self, table: LookupTable, name: &str) -> LookupEntry {
        let entries = self.lookups.entry(table).or_default();
        if let Some(existing) = entries.iter().find(|e| e.name == name) {
            return existing.clone();
        }
        let entry = LookupEntry {
            id: entries.iter().map(|e| e.id).max().unwrap_or(0) + 1,
            name: name.to_string(),
        };
        entries.push(entry.clone());
        entry
    }
}

/// An insight with every relation name resolved
#[derive(Debug, Clone)]
pub(crate) struct ResolvedRow {
    pub id: i64,
    pub row: NewInsight,
    pub sector: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub topic: Option<String>,
    pub pestle: Option<String>,
    pub source: Option<String>,
}

impl ResolvedRow {
    pub fn to_insight(&self) -> Insight {
        let row = &self.row;
        Insight {
            id: self.id,
            end_year: row.end_year,
            intensity: row.intensity,
            impact: row.impact,
            likelihood: row.likelihood,
            relevance: row.relevance,
            start_year: row.start_year,
            added: row.added.clone(),
            published: row.published.clone(),
            url: row.url.clone(),
            insight: row.insight.clone(),
            title: row.title.clone(),
            sector_id: row.sector_id,
            region_id: row.region_id,
            country_id: row.country_id,
            topic_id: row.topic_id,
            pestle_id: row.pestle_id,
            source_id: row.source_id,
            sectors: self.sector.clone().map(NamedRef::new),
            regions: self.region.clone().map(NamedRef::new),
        }
    }

    pub fn to_detail(&self) -> InsightDetail {
        InsightDetail {
            id: self.id,
            title: self.row.title.clone(),
            added: self.row.added.clone(),
            intensity: self.row.intensity,
            likelihood: self.row.likelihood,
            relevance: self.row.relevance,
            impact: self.row.impact,
            sector: self.sector.clone().map(NamedRef::new),
            region: self.region.clone().map(NamedRef::new),
            country: self.country.clone().map(NamedRef::new),
            topic: self.topic.clone().map(NamedRef::new),
            pestle: self.pestle.clone().map(NamedRef::new),
            source: self.source.clone().map(NamedRef::new),
        }
    }
}

/// Store holding all rows in memory behind a shared lock
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<MemoryData>>,
    failure: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            data: Arc::default(),
            failure: Some(message.into()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(Error::Store(message.clone())),
            None => Ok(()),
        }
    }

    /// Insert (or find) a lookup name and return its id
    pub fn add_lookup(&self, table: LookupTable, name: &str) -> i64 {
        self.write().upsert(table, name).id
    }

    /// Insert one insight without foreign key checks and return its id
    pub fn add(&self, row: NewInsight) -> i64 {
        let mut data = self.write();
        data.next_insight_id += 1;
        let id = data.next_insight_id;
        data.insights.push((id, row));
        id
    }

    pub(crate) fn upsert_names(
        &self,
        table: LookupTable,
        names: &[String],
    ) -> Result<Vec<LookupEntry>> {
        self.check()?;
        let mut data = self.write();
        let mut entries: Vec<LookupEntry> = Vec::with_capacity(names.len());
        for name in names {
            if entries.iter().any(|e| &e.name == name) {
                continue;
            }
            entries.push(data.upsert(table, name));
        }
        Ok(entries)
    }

    /// Insert a batch atomically, rejecting ids with no lookup row
    pub(crate) fn insert_rows(&self, rows: &[NewInsight]) -> Result<usize> {
        self.check()?;
        let mut data = self.write();

        for row in rows {
            let refs = [
                (LookupTable::Sectors, row.sector_id),
                (LookupTable::Regions, row.region_id),
                (LookupTable::Countries, row.country_id),
                (LookupTable::Topics, row.topic_id),
                (LookupTable::Pestle, row.pestle_id),
                (LookupTable::Sources, row.source_id),
            ];
            if let Some((table, _)) = refs.iter().find(|(t, id)| !data.lookup_exists(*t, *id)) {
                return Err(Error::Store(format!(
                    "insert on table \"insights\" violates foreign key constraint on \"{}\"",
                    table
                )));
            }
        }

        for row in rows {
            data.next_insight_id += 1;
            let id = data.next_insight_id;
            data.insights.push((id, row.clone()));
        }
        Ok(rows.len())
    }

    /// Every insight in id order with relation names resolved
    pub(crate) fn resolved_rows(&self) -> Result<Vec<ResolvedRow>> {
        self.check()?;
        let data = self.read();
        Ok(data
            .insights
            .iter()
            .map(|(id, row)| ResolvedRow {
                id: *id,
                row: row.clone(),
                sector: data.lookup_name(LookupTable::Sectors, row.sector_id),
                region: data.lookup_name(LookupTable::Regions, row.region_id),
                country: data.lookup_name(LookupTable::Countries, row.country_id),
                topic: data.lookup_name(LookupTable::Topics, row.topic_id),
                pestle: data.lookup_name(LookupTable::Pestle, row.pestle_id),
                source: data.lookup_name(LookupTable::Sources, row.source_id),
            })
            .collect())
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn lookup_entries(&self, table: LookupTable) -> Result<Vec<LookupEntry>> {
        self.check()?;
        Ok(self.read().lookups.get(&table).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl InsightStore for MemoryStore {
    async fn list_insights(&self, request: &PageRequest) -> Result<Page<Insight>> {
        let rows = self.resolved_rows()?;
        let total = rows.len() as i64;
        let data = rows
            .iter()
            .skip(request.offset() as usize)
            .take(request.limit as usize)
            .map(ResolvedRow::to_insight)
            .collect();
        Ok(Page::new(request, data, total))
    }

    async fn sector_names(&self) -> Result<Vec<String>> {
        Ok(self
            .resolved_rows()?
            .into_iter()
            .filter_map(|r| r.sector)
            .collect())
    }

    async fn region_names(&self) -> Result<Vec<String>> {
        Ok(self
            .resolved_rows()?
            .into_iter()
            .filter_map(|r| r.region)
            .collect())
    }

    async fn added_dates(&self) -> Result<Vec<String>> {
        Ok(self
            .resolved_rows()?
            .into_iter()
            .filter_map(|r| r.row.added)
            .collect())
    }

    async fn likelihood_intensity(&self) -> Result<Vec<LikelihoodIntensityRow>> {
        Ok(self
            .resolved_rows()?
            .into_iter()
            .filter_map(|r| {
                Some(LikelihoodIntensityRow {
                    likelihood: r.row.likelihood?,
                    intensity: r.row.intensity?,
                    title: r.row.title,
                    sector: r.sector,
                    pestle: r.pestle,
                })
            })
            .collect())
    }

    async fn relevance_likelihood(&self) -> Result<Vec<RelevanceLikelihoodRow>> {
        Ok(self
            .resolved_rows()?
            .into_iter()
            .filter_map(|r| {
                Some(RelevanceLikelihoodRow {
                    relevance: r.row.relevance?,
                    likelihood: r.row.likelihood?,
                    sector: r.sector?,
                })
            })
            .collect())
    }

    async fn upsert_lookup(
        &self,
        table: LookupTable,
        names: &[String],
    ) -> Result<Vec<LookupEntry>> {
        self.upsert_names(table, names)
    }

    async fn insert_insights(&self, rows: &[NewInsight]) -> Result<usize> {
        self.insert_rows(rows)
    }

    async fn count_rows(&self, table: Table) -> Result<i64> {
        self.check()?;
        let data = self.read();
        let count = match table {
            Table::Insights => data.insights.len(),
            Table::Lookup(lookup) => data.lookups.get(&lookup).map_or(0, Vec::len),
        };
        Ok(count as i64)
    }

    async fn sample_insight(&self) -> Result<Option<InsightDetail>> {
        Ok(self
            .resolved_rows()?
            .first()
            .map(ResolvedRow::to_detail))
    }

    async fn health_check(&self) -> bool {
        self.failure.is_none()
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
