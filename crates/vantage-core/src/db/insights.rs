//! Insight queries

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::{
    Insight, InsightDetail, LikelihoodIntensityRow, NamedRef, NewInsight, Page, PageRequest,
    RelevanceLikelihoodRow,
};

impl Database {
    /// List one page of insights with sector and region names embedded
    pub fn list_insights_page(&self, request: &PageRequest) -> Result<Page<Insight>> {
        let conn = self.conn()?;

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM insights", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT i.id, i.end_year, i.intensity, i.impact, i.likelihood, i.relevance, i.start_year,
                   i.added, i.published, i.url, i.insight, i.title,
                   i.sector_id, i.region_id, i.country_id, i.topic_id, i.pestle_id, i.source_id,
                   s.name, r.name
            FROM insights i
            LEFT JOIN sectors s ON s.id = i.sector_id
            LEFT JOIN regions r ON r.id = i.region_id
            ORDER BY i.id
            LIMIT ? OFFSET ?
            "#,
        )?;

        let data = stmt
            .query_map(params![request.limit, request.offset()], |row| {
                Self::row_to_insight(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Page::new(request, data, total))
    }

    /// Helper to convert a row to Insight
    /// Column order: id, end_year, intensity, impact, likelihood, relevance, start_year,
    ///               added, published, url, insight, title, sector_id, region_id,
    ///               country_id, topic_id, pestle_id, source_id, sector name, region name
    fn row_to_insight(row: &rusqlite::Row) -> rusqlite::Result<Insight> {
        let sector: Option<String> = row.get(18)?;
        let region: Option<String> = row.get(19)?;
        Ok(Insight {
            id: row.get(0)?,
            end_year: row.get(1)?,
            intensity: row.get(2)?,
            impact: row.get(3)?,
            likelihood: row.get(4)?,
            relevance: row.get(5)?,
            start_year: row.get(6)?,
            added: row.get(7)?,
            published: row.get(8)?,
            url: row.get(9)?,
            insight: row.get(10)?,
            title: row.get(11)?,
            sector_id: row.get(12)?,
            region_id: row.get(13)?,
            country_id: row.get(14)?,
            topic_id: row.get(15)?,
            pestle_id: row.get(16)?,
            source_id: row.get(17)?,
            sectors: sector.map(NamedRef::new),
            regions: region.map(NamedRef::new),
        })
    }

    /// Sector name of every insight that has one, in insight order
    pub fn list_sector_names(&self) -> Result<Vec<String>> {
        self.query_strings(
            "SELECT s.name FROM insights i JOIN sectors s ON s.id = i.sector_id ORDER BY i.id",
        )
    }

    /// Region name of every insight that has one, in insight order
    pub fn list_region_names(&self) -> Result<Vec<String>> {
        self.query_strings(
            "SELECT r.name FROM insights i JOIN regions r ON r.id = i.region_id ORDER BY i.id",
        )
    }

    /// Non-null `added` timestamps
    pub fn list_added_dates(&self) -> Result<Vec<String>> {
        self.query_strings("SELECT added FROM insights WHERE added IS NOT NULL ORDER BY id")
    }

    fn query_strings(&self, sql: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let values = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(values)
    }

    /// Insights with both likelihood and intensity set
    pub fn list_likelihood_intensity(&self) -> Result<Vec<LikelihoodIntensityRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT i.likelihood, i.intensity, i.title, s.name, p.name
            FROM insights i
            LEFT JOIN sectors s ON s.id = i.sector_id
            LEFT JOIN pestle p ON p.id = i.pestle_id
            WHERE i.likelihood IS NOT NULL AND i.intensity IS NOT NULL
            ORDER BY i.id
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(LikelihoodIntensityRow {
                    likelihood: row.get(0)?,
                    intensity: row.get(1)?,
                    title: row.get(2)?,
                    sector: row.get(3)?,
                    pestle: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Insights with relevance, likelihood and a sector all present
    pub fn list_relevance_likelihood(&self) -> Result<Vec<RelevanceLikelihoodRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT i.relevance, i.likelihood, s.name
            FROM insights i
            JOIN sectors s ON s.id = i.sector_id
            WHERE i.relevance IS NOT NULL AND i.likelihood IS NOT NULL
            ORDER BY i.id
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(RelevanceLikelihoodRow {
                    relevance: row.get(0)?,
                    likelihood: row.get(1)?,
                    sector: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Insert a batch of insights in a single transaction
    ///
    /// Either every row lands or none do.
    pub fn insert_insight_batch(&self, rows: &[NewInsight]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO insights (end_year, intensity, impact, likelihood, relevance, start_year,
                                      added, published, url, insight, title,
                                      sector_id, region_id, country_id, topic_id, pestle_id, source_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;

            for row in rows {
                stmt.execute(params![
                    row.end_year,
                    row.intensity,
                    row.impact,
                    row.likelihood,
                    row.relevance,
                    row.start_year,
                    row.added,
                    row.published,
                    row.url,
                    row.insight,
                    row.title,
                    row.sector_id,
                    row.region_id,
                    row.country_id,
                    row.topic_id,
                    row.pestle_id,
                    row.source_id,
                ])?;
            }
        }
        tx.commit()?;

        Ok(rows.len())
    }

    /// First insight with every relation resolved
    pub fn get_sample_insight(&self) -> Result<Option<InsightDetail>> {
        let conn = self.conn()?;
        let detail = conn
            .query_row(
                r#"
                SELECT i.id, i.title, i.added, i.intensity, i.likelihood, i.relevance, i.impact,
                       s.name, r.name, c.name, t.name, p.name, src.name
                FROM insights i
                LEFT JOIN sectors s ON s.id = i.sector_id
                LEFT JOIN regions r ON r.id = i.region_id
                LEFT JOIN countries c ON c.id = i.country_id
                LEFT JOIN topics t ON t.id = i.topic_id
                LEFT JOIN pestle p ON p.id = i.pestle_id
                LEFT JOIN sources src ON src.id = i.source_id
                ORDER BY i.id
                LIMIT 1
                "#,
                [],
                |row| {
                    let named = |idx: usize| -> rusqlite::Result<Option<NamedRef>> {
                        Ok(row.get::<_, Option<String>>(idx)?.map(NamedRef::new))
                    };
                    Ok(InsightDetail {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        added: row.get(2)?,
                        intensity: row.get(3)?,
                        likelihood: row.get(4)?,
                        relevance: row.get(5)?,
                        impact: row.get(6)?,
                        sector: named(7)?,
                        region: named(8)?,
                        country: named(9)?,
                        topic: named(10)?,
                        pestle: named(11)?,
                        source: named(12)?,
                    })
                },
            )
            .optional()?;

        Ok(detail)
    }
}
