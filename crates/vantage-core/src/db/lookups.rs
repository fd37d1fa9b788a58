//! Lookup table operations

use rusqlite::params;

use super::Database;
use crate::error::Result;
use crate::models::{LookupEntry, LookupTable, Table};

impl Database {
    /// Insert any missing names into a lookup table and return the `{id, name}`
    /// row for every requested name
    ///
    /// Existing rows keep their ids. Output follows the order of `names`,
    /// with duplicates collapsed.
    pub fn upsert_lookup_names(
        &self,
        table: LookupTable,
        names: &[String],
    ) -> Result<Vec<LookupEntry>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut entries: Vec<LookupEntry> = Vec::with_capacity(names.len());
        {
            // Table names come from a closed enum, never from input
            let insert_sql = format!(
                "INSERT INTO {} (name) VALUES (?) ON CONFLICT(name) DO NOTHING",
                table.as_str()
            );
            let select_sql = format!("SELECT id FROM {} WHERE name = ?", table.as_str());
            let mut insert = tx.prepare(&insert_sql)?;
            let mut select = tx.prepare(&select_sql)?;

            for name in names {
                if entries.iter().any(|e| &e.name == name) {
                    continue;
                }
                insert.execute(params![name])?;
                let id: i64 = select.query_row(params![name], |row| row.get(0))?;
                entries.push(LookupEntry {
                    id,
                    name: name.clone(),
                });
            }
        }
        tx.commit()?;

        Ok(entries)
    }

    /// Count rows in a table
    pub fn count_table_rows(&self, table: Table) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.as_str()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
