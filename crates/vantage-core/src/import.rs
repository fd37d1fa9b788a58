//! CSV import of the insights dataset
//!
//! Loading runs in two phases: every distinct category value is upserted
//! into its lookup table first, then insight rows are inserted in chunks
//! with their foreign keys resolved through the returned ids.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dates;
use crate::error::{Error, Result};
use crate::models::{LookupTable, NewInsight};
use crate::store::InsightStore;

/// Rows per insert request
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// One line of the dataset CSV, every column as raw text
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CsvRecord {
    pub end_year: String,
    pub intensity: String,
    pub sector: String,
    pub topic: String,
    pub insight: String,
    pub url: String,
    pub region: String,
    pub start_year: String,
    pub impact: String,
    pub added: String,
    pub published: String,
    pub country: String,
    pub relevance: String,
    pub pestle: String,
    pub source: String,
    pub title: String,
    pub likelihood: String,
}

impl CsvRecord {
    /// Raw value of the column backed by `table`
    pub fn category(&self, table: LookupTable) -> &str {
        match table {
            LookupTable::Sectors => &self.sector,
            LookupTable::Regions => &self.region,
            LookupTable::Countries => &self.country,
            LookupTable::Topics => &self.topic,
            LookupTable::Pestle => &self.pestle,
            LookupTable::Sources => &self.source,
        }
    }
}

/// Parsed CSV plus the distinct category values it references
#[derive(Debug, Clone, Default)]
pub struct ParsedDataset {
    pub records: Vec<CsvRecord>,
    /// Distinct non-empty values per lookup table, in first-seen order
    pub lookups: BTreeMap<LookupTable, Vec<String>>,
}

/// Outcome of an import run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportStats {
    pub records: usize,
    pub inserted: usize,
    pub failed_chunks: usize,
    /// Rows returned by each lookup upsert, keyed by table name
    pub lookups: BTreeMap<String, usize>,
    /// `added`/`published` values that could not be parsed and were stored as null
    pub unparsed_dates: usize,
}

/// Parse the dataset CSV
///
/// Extra columns are ignored and missing ones read as empty.
pub fn parse_csv<R: Read>(reader: R) -> Result<ParsedDataset> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut dataset = ParsedDataset::default();

    for result in rdr.deserialize() {
        let record: CsvRecord = result?;

        for table in LookupTable::ALL {
            let value = record.category(table);
            if value.is_empty() {
                continue;
            }
            let values = dataset.lookups.entry(table).or_default();
            if !values.iter().any(|v| v == value) {
                values.push(value.to_string());
            }
        }

        dataset.records.push(record);
    }

    debug!(
        records = dataset.records.len(),
        "Parsed insights CSV"
    );
    Ok(dataset)
}

/// Parse an integer column, tolerating `"3.0"` style values
///
/// Empty or non-numeric values become `None`.
pub fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| f.trunc() as i64)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Lower-cased name → id, per lookup table
type LookupIds = HashMap<LookupTable, HashMap<String, i64>>;

fn resolve(ids: &LookupIds, table: LookupTable, value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    ids.get(&table)?.get(&value.to_lowercase()).copied()
}

/// Loads a parsed dataset into a store
pub struct Importer<'a, S: InsightStore + ?Sized> {
    store: &'a S,
    chunk_size: usize,
}

impl<'a, S: InsightStore + ?Sized> Importer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the rows per insert request (at least 1)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Upsert lookups, then insert every record
    ///
    /// A failed lookup upsert aborts the run since no row could reference it.
    /// A failed insert chunk is logged and skipped.
    pub async fn run(&self, dataset: &ParsedDataset) -> Result<ImportStats> {
        if !self.store.health_check().await {
            return Err(Error::Store(format!(
                "Store is not reachable: {}",
                self.store.describe()
            )));
        }

        let mut stats = ImportStats {
            records: dataset.records.len(),
            ..Default::default()
        };

        let mut ids: LookupIds = HashMap::new();
        for table in LookupTable::ALL {
            let Some(names) = dataset.lookups.get(&table).filter(|n| !n.is_empty()) else {
                continue;
            };

            let entries = self
                .store
                .upsert_lookup(table, names)
                .await
                .map_err(|e| Error::Import(format!("Failed to upsert {}: {}", table, e)))?;

            info!(table = %table, count = entries.len(), "Upserted lookup values");
            stats.lookups.insert(table.to_string(), entries.len());
            ids.insert(
                table,
                entries
                    .into_iter()
                    .map(|e| (e.name.to_lowercase(), e.id))
                    .collect(),
            );
        }

        let rows: Vec<NewInsight> = dataset
            .records
            .iter()
            .map(|record| self.to_new_insight(record, &ids, &mut stats.unparsed_dates))
            .collect();

        let total_chunks = rows.len().div_ceil(self.chunk_size);
        for (i, chunk) in rows.chunks(self.chunk_size).enumerate() {
            match self.store.insert_insights(chunk).await {
                Ok(n) => {
                    stats.inserted += n;
                    info!(chunk = i + 1, total_chunks, rows = n, "Inserted chunk");
                }
                Err(e) => {
                    stats.failed_chunks += 1;
                    warn!(chunk = i + 1, total_chunks, error = %e, "Failed to insert chunk");
                }
            }
        }

        info!(
            records = stats.records,
            inserted = stats.inserted,
            failed_chunks = stats.failed_chunks,
            "Import finished"
        );
        Ok(stats)
    }

    fn to_new_insight(
        &self,
        record: &CsvRecord,
        ids: &LookupIds,
        unparsed_dates: &mut usize,
    ) -> NewInsight {
        let mut date = |value: &str| -> Option<String> {
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            let normalized = dates::normalize(value);
            if normalized.is_none() {
                *unparsed_dates += 1;
                debug!(value, "Unparseable date stored as null");
            }
            normalized
        };

        NewInsight {
            end_year: parse_int(&record.end_year),
            intensity: parse_int(&record.intensity),
            impact: parse_int(&record.impact),
            likelihood: parse_int(&record.likelihood),
            relevance: parse_int(&record.relevance),
            start_year: parse_int(&record.start_year),
            added: date(&record.added),
            published: date(&record.published),
            url: non_empty(&record.url),
            insight: non_empty(&record.insight),
            title: non_empty(&record.title),
            sector_id: resolve(ids, LookupTable::Sectors, &record.sector),
            region_id: resolve(ids, LookupTable::Regions, &record.region),
            country_id: resolve(ids, LookupTable::Countries, &record.country),
            topic_id: resolve(ids, LookupTable::Topics, &record.topic),
            pestle_id: resolve(ids, LookupTable::Pestle, &record.pestle),
            source_id: resolve(ids, LookupTable::Sources, &record.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Insight, InsightDetail, LikelihoodIntensityRow, LookupEntry, Page, PageRequest,
        RelevanceLikelihoodRow, Table,
    };
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SAMPLE: &str = "\
end_year,intensity,sector,topic,insight,url,region,start_year,impact,added,published,country,relevance,pestle,source,title,likelihood
,6,Energy,gas,Annual Energy Outlook,http://a.example,Northern America,,,\"January, 20 2017 03:51:25\",\"January, 09 2017 00:00:00\",United States of America,2,Industries,EIA,U.S. natural gas consumption,3
2018,6.0,Retail,oil,Store closures,http://b.example,World,2017,,\"January, 20 2017 03:51:25\",,,2,Economic,WSJ,Retailers close stores,2
,,energy,,Outlook,,Asia,,,not a date,,,,,,,
";

    #[test]
    fn test_parse_csv_collects_distinct_lookups() {
        let dataset = parse_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(dataset.records.len(), 3);

        // Case-distinct values are kept apart here; ids merge them later
        assert_eq!(
            dataset.lookups[&LookupTable::Sectors],
            vec!["Energy".to_string(), "Retail".to_string(), "energy".to_string()]
        );
        assert_eq!(dataset.lookups[&LookupTable::Regions].len(), 3);
        assert_eq!(dataset.lookups[&LookupTable::Countries].len(), 1);
        assert_eq!(dataset.records[0].added, "January, 20 2017 03:51:25");
    }

    #[test]
    fn test_parse_csv_tolerates_missing_and_extra_columns() {
        let csv = "title,likelihood,mystery\nShale boom,4,x\n\nGrid,,y\n";
        let dataset = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.records[0].title, "Shale boom");
        assert_eq!(dataset.records[0].sector, "");
        assert!(dataset.lookups.is_empty());
    }

    #[test]
    fn test_parse_int_is_lenient() {
        assert_eq!(parse_int("6"), Some(6));
        assert_eq!(parse_int(" 6.0 "), Some(6));
        assert_eq!(parse_int("2.9"), Some(2));
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("high"), None);
        assert_eq!(parse_int("NaN"), None);
    }

    #[tokio::test]
    async fn test_import_into_memory_store() {
        let store = MemoryStore::new();
        let dataset = parse_csv(SAMPLE.as_bytes()).unwrap();

        let stats = Importer::new(&store).run(&dataset).await.unwrap();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.inserted, 3);
        assert_eq!(stats.failed_chunks, 0);
        assert_eq!(stats.unparsed_dates, 1);
        assert_eq!(stats.lookups["sectors"], 3);

        let page = store.list_insights(&PageRequest::default()).await.unwrap();
        assert_eq!(page.data[0].added.as_deref(), Some("2017-01-20T03:51:25"));
        assert_eq!(page.data[0].published.as_deref(), Some("2017-01-09T00:00:00"));
        assert_eq!(page.data[1].intensity, Some(6));
        assert_eq!(page.data[1].end_year, Some(2018));
        assert_eq!(page.data[2].added, None);

        // "energy" and "Energy" resolve through the same lower-cased key
        assert_eq!(page.data[0].sector_id, page.data[2].sector_id);
    }

    #[tokio::test]
    async fn test_import_rejects_unreachable_store() {
        let store = MemoryStore::failing("connection refused");
        let dataset = parse_csv(SAMPLE.as_bytes()).unwrap();

        let err = Importer::new(&store).run(&dataset).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    /// Delegates to a memory store but fails the n-th insert call
    struct FlakyStore {
        inner: MemoryStore,
        inserts: AtomicUsize,
        fail_on: usize,
    }

    #[async_trait]
    impl InsightStore for FlakyStore {
        async fn list_insights(&self, request: &PageRequest) -> Result<Page<Insight>> {
            self.inner.list_insights(request).await
        }
        async fn sector_names(&self) -> Result<Vec<String>> {
            self.inner.sector_names().await
        }
        async fn region_names(&self) -> Result<Vec<String>> {
            self.inner.region_names().await
        }
        async fn added_dates(&self) -> Result<Vec<String>> {
            self.inner.added_dates().await
        }
        async fn likelihood_intensity(&self) -> Result<Vec<LikelihoodIntensityRow>> {
            self.inner.likelihood_intensity().await
        }
        async fn relevance_likelihood(&self) -> Result<Vec<RelevanceLikelihoodRow>> {
            self.inner.relevance_likelihood().await
        }
        async fn upsert_lookup(
            &self,
            table: LookupTable,
            names: &[String],
        ) -> Result<Vec<LookupEntry>> {
            self.inner.upsert_lookup(table, names).await
        }
        async fn insert_insights(&self, rows: &[NewInsight]) -> Result<usize> {
            let call = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on {
                return Err(Error::Store("duplicate key value".into()));
            }
            self.inner.insert_insights(rows).await
        }
        async fn count_rows(&self, table: Table) -> Result<i64> {
            self.inner.count_rows(table).await
        }
        async fn sample_insight(&self) -> Result<Option<InsightDetail>> {
            self.inner.sample_insight().await
        }
        async fn health_check(&self) -> bool {
            true
        }
        fn describe(&self) -> String {
            "flaky".into()
        }
    }

    #[tokio::test]
    async fn test_failed_chunk_is_skipped() {
        let store = FlakyStore {
            inner: MemoryStore::new(),
            inserts: AtomicUsize::new(0),
            fail_on: 2,
        };
        let dataset = parse_csv(SAMPLE.as_bytes()).unwrap();

        let stats = Importer::new(&store)
            .with_chunk_size(1)
            .run(&dataset)
            .await
            .unwrap();
        assert_eq!(stats.failed_chunks, 1);
        assert_eq!(stats.inserted, 2);
        assert_eq!(store.count_rows(Table::Insights).await.unwrap(), 2);
    }

    #[test]
    fn test_chunk_size_has_a_floor() {
        let store = MemoryStore::new();
        assert_eq!(Importer::new(&store).with_chunk_size(0).chunk_size, 1);
    }
}
