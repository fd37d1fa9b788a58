//! Database tests

use super::*;
use crate::models::*;

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn seed(db: &Database) {
    let sectors = db
        .upsert_lookup_names(LookupTable::Sectors, &names(&["Energy", "Retail"]))
        .unwrap();
    let regions = db
        .upsert_lookup_names(LookupTable::Regions, &names(&["Asia"]))
        .unwrap();
    let pestle = db
        .upsert_lookup_names(LookupTable::Pestle, &names(&["Economic"]))
        .unwrap();

    let rows = vec![
        NewInsight {
            title: Some("Oil output".into()),
            likelihood: Some(3),
            intensity: Some(6),
            relevance: Some(2),
            added: Some("2016-01-20T03:51:25".into()),
            sector_id: Some(sectors[0].id),
            region_id: Some(regions[0].id),
            pestle_id: Some(pestle[0].id),
            ..Default::default()
        },
        NewInsight {
            title: Some("Store closures".into()),
            likelihood: Some(2),
            intensity: None,
            relevance: Some(4),
            added: Some("2017-03-02T00:00:00".into()),
            sector_id: Some(sectors[1].id),
            ..Default::default()
        },
        NewInsight {
            title: None,
            likelihood: Some(1),
            intensity: Some(1),
            ..Default::default()
        },
    ];
    assert_eq!(db.insert_insight_batch(&rows).unwrap(), 3);
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.ping().is_ok());
    assert!(!db.is_encrypted().unwrap());

    let page = db.list_insights_page(&PageRequest::default()).unwrap();
    assert!(page.data.is_empty());
    assert_eq!(page.total, 0);
}

#[test]
fn test_schema_has_lookup_tables() {
    let db = Database::in_memory().unwrap();
    let conn = db.conn().unwrap();

    for table in LookupTable::ALL {
        let result: i64 = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name IN ('id', 'name')",
                    table.as_str()
                ),
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(result, 2, "{} should have id and name columns", table);
    }
}

#[test]
fn test_upsert_lookup_keeps_existing_ids() {
    let db = Database::in_memory().unwrap();

    let first = db
        .upsert_lookup_names(LookupTable::Sectors, &names(&["Energy", "Retail"]))
        .unwrap();
    let second = db
        .upsert_lookup_names(LookupTable::Sectors, &names(&["Retail", "Energy", "Energy"]))
        .unwrap();

    assert_eq!(second.len(), 2);
    assert_eq!(second[0].name, "Retail");
    assert_eq!(second[0].id, first[1].id);
    assert_eq!(second[1].id, first[0].id);
    assert_eq!(
        db.count_table_rows(Table::Lookup(LookupTable::Sectors))
            .unwrap(),
        2
    );
}

#[test]
fn test_list_insights_page_embeds_names() {
    let db = Database::in_memory().unwrap();
    seed(&db);

    let page = db.list_insights_page(&PageRequest::new(1, 2).unwrap()).unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].sectors, Some(NamedRef::new("Energy")));
    assert_eq!(page.data[0].regions, Some(NamedRef::new("Asia")));
    assert_eq!(page.data[1].regions, None);

    let page = db.list_insights_page(&PageRequest::new(2, 2).unwrap()).unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].title, None);

    // Past the end is an empty page, not an error
    let page = db.list_insights_page(&PageRequest::new(9, 2).unwrap()).unwrap();
    assert!(page.data.is_empty());
    assert_eq!(page.total, 3);
}

#[test]
fn test_aggregation_inputs() {
    let db = Database::in_memory().unwrap();
    seed(&db);

    assert_eq!(db.list_sector_names().unwrap(), names(&["Energy", "Retail"]));
    assert_eq!(db.list_region_names().unwrap(), names(&["Asia"]));
    assert_eq!(db.list_added_dates().unwrap().len(), 2);

    let points = db.list_likelihood_intensity().unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].sector.as_deref(), Some("Energy"));
    assert_eq!(points[0].pestle.as_deref(), Some("Economic"));
    assert_eq!(points[1].title, None);

    let averages = db.list_relevance_likelihood().unwrap();
    assert_eq!(averages.len(), 2);
    assert_eq!(averages[1].sector, "Retail");
}

#[test]
fn test_sample_insight_resolves_relations() {
    let db = Database::in_memory().unwrap();
    assert_eq!(db.get_sample_insight().unwrap(), None);

    seed(&db);
    let sample = db.get_sample_insight().unwrap().unwrap();
    assert_eq!(sample.title.as_deref(), Some("Oil output"));
    assert_eq!(sample.sector, Some(NamedRef::new("Energy")));
    assert_eq!(sample.pestle, Some(NamedRef::new("Economic")));
    assert_eq!(sample.country, None);
}

#[test]
fn test_insert_batch_rejects_unknown_foreign_key() {
    let db = Database::in_memory().unwrap();
    let rows = vec![
        NewInsight {
            title: Some("ok".into()),
            ..Default::default()
        },
        NewInsight {
            sector_id: Some(999),
            ..Default::default()
        },
    ];

    assert!(db.insert_insight_batch(&rows).is_err());
    // The whole batch rolled back
    assert_eq!(db.count_table_rows(Table::Insights).unwrap(), 0);
}

#[test]
fn test_encrypted_database_requires_passphrase() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vantage.db");
    let path = path.to_string_lossy();

    assert!(matches!(
        Database::new(&path, ""),
        Err(Error::Encryption(_))
    ));

    let db = Database::new(&path, "correct horse").unwrap();
    assert!(db.is_encrypted().unwrap());
    assert_eq!(db.path(), path);
}
