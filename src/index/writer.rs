use std::collections::BTreeMap;

use rusqlite::{params, Transaction};
use serde::{Deserialize, Serialize};

use super::connection::IndexDatabase;
use crate::errors::{LinkError, Result};
use crate::types::{ResultHandle, ROOT_LEVEL};

/// A record to be written into the link index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInput {
    pub collection_id: String,
    pub level: String,
    pub xml: Option<String>,
    pub relative_path: Option<String>,
    pub uri_fragment: Option<String>,
    /// Bookmark names found in the record.
    pub destinations: Vec<String>,
    /// Searchable `(field, value)` pairs. Field names are case-insensitive.
    pub fields: Vec<(String, String)>,
}

impl RecordInput {
    /// A collection root record carrying the serialized root markup.
    pub fn root(collection_id: &str, xml: &str) -> Self {
        Self {
            collection_id: collection_id.to_string(),
            level: ROOT_LEVEL.to_string(),
            xml: Some(xml.to_string()),
            ..Self::default()
        }
    }

    /// A content record exported to `relative_path`.
    pub fn document(collection_id: &str, level: &str, relative_path: &str) -> Self {
        Self {
            collection_id: collection_id.to_string(),
            level: level.to_string(),
            relative_path: Some(relative_path.to_string()),
            uri_fragment: Some(String::new()),
            ..Self::default()
        }
    }

    pub fn with_destination(mut self, name: &str) -> Self {
        self.destinations.push(name.to_string());
        self
    }

    pub fn with_field(mut self, field: &str, value: &str) -> Self {
        self.fields.push((field.to_string(), value.to_string()));
        self
    }

    pub fn with_uri_fragment(mut self, fragment: &str) -> Self {
        self.uri_fragment = Some(fragment.to_string());
        self
    }
}

/// Aggregate counts describing an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub record_count: u64,
    pub root_count: u64,
    pub destination_count: u64,
    pub records_by_collection: BTreeMap<String, u64>,
}

fn write_record(tx: &Transaction<'_>, record: &RecordInput) -> rusqlite::Result<i64> {
    tx.prepare_cached(
        "INSERT INTO records (collection_id, level, xml, relative_path, uri_fragment)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(params![
        record.collection_id,
        record.level,
        record.xml,
        record.relative_path,
        record.uri_fragment,
    ])?;
    let record_id = tx.last_insert_rowid();

    let mut dest_stmt =
        tx.prepare_cached("INSERT INTO destinations (record_id, name) VALUES (?1, ?2)")?;
    for name in &record.destinations {
        dest_stmt.execute(params![record_id, name])?;
    }

    let mut field_stmt = tx.prepare_cached(
        "INSERT INTO record_fields (record_id, field, value) VALUES (?1, ?2, ?3)",
    )?;
    let mut text_stmt = tx.prepare_cached(
        "INSERT INTO record_text (field, body, record_id) VALUES (?1, ?2, ?3)",
    )?;
    for (field, value) in &record.fields {
        let field = field.to_lowercase();
        field_stmt.execute(params![record_id, field, value])?;
        text_stmt.execute(params![field, value, record_id])?;
    }

    Ok(record_id)
}

impl IndexDatabase {
    /// Inserts a single record and returns its handle.
    pub fn insert_record(&self, record: &RecordInput) -> Result<ResultHandle> {
        let mut handles = self.insert_records(std::slice::from_ref(record))?;
        handles.pop().ok_or_else(|| LinkError::Index {
            message: "insert produced no record".to_string(),
            operation: "insert_record".to_string(),
        })
    }

    /// Inserts a batch of records inside a single transaction.
    pub fn insert_records(&self, records: &[RecordInput]) -> Result<Vec<ResultHandle>> {
        let tx = self
            .conn()
            .unchecked_transaction()
            .map_err(|e| LinkError::Index {
                message: format!("failed to begin transaction: {e}"),
                operation: "insert_records".to_string(),
            })?;

        let mut handles = Vec::with_capacity(records.len());
        for record in records {
            let id = write_record(&tx, record).map_err(|e| LinkError::Index {
                message: format!("failed to insert record: {e}"),
                operation: "insert_records".to_string(),
            })?;
            handles.push(ResultHandle(id));
        }

        tx.commit().map_err(|e| LinkError::Index {
            message: format!("failed to commit transaction: {e}"),
            operation: "insert_records".to_string(),
        })?;

        Ok(handles)
    }

    /// Returns aggregate statistics about the index.
    pub fn stats(&self) -> Result<IndexStats> {
        let map_err = |e: rusqlite::Error| LinkError::Index {
            message: format!("failed to read index statistics: {e}"),
            operation: "stats".to_string(),
        };

        let (record_count, root_count): (i64, i64) = self
            .conn()
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(level = ?1), 0) FROM records",
                params![ROOT_LEVEL],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(map_err)?;

        let destination_count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM destinations", [], |row| row.get(0))
            .map_err(map_err)?;

        let mut stmt = self
            .conn()
            .prepare("SELECT collection_id, COUNT(*) FROM records GROUP BY collection_id")
            .map_err(map_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(map_err)?;

        let mut records_by_collection = BTreeMap::new();
        for row in rows {
            let (collection, count) = row.map_err(map_err)?;
            records_by_collection.insert(collection, count as u64);
        }

        Ok(IndexStats {
            record_count: record_count as u64,
            root_count: root_count as u64,
            destination_count: destination_count as u64,
            records_by_collection,
        })
    }
}
