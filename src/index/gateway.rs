use rusqlite::{params, params_from_iter, OptionalExtension};

use super::connection::IndexDatabase;
use crate::analysis::{parse_query, AnalysisProfile, FieldAnalysis, QueryNode};
use crate::errors::{LinkError, Result};
use crate::types::{Clause, IndexedRecord, Requirement, ResultHandle, SearchField, ROOT_LEVEL};

/// Outcome of a free-text search that parsed successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeTextResult {
    /// Normalized rendering of the parsed query.
    pub normalized: String,
    pub hit: Option<ResultHandle>,
}

/// Read access to the link index.
///
/// Every search returns at most one hit: lookups are keyed on exact terms,
/// not ranked retrieval.
pub trait SearchGateway {
    /// Runs a boolean combination of exact-term clauses.
    ///
    /// All `Must` clauses have to match. `Should` clauses are optional when a
    /// `Must` clause is present and only order the candidates; otherwise at
    /// least one of them has to match.
    fn structured_search(&self, clauses: &[Clause]) -> Result<Option<ResultHandle>>;

    /// Parses `query` under `profile` and searches that profile's collection.
    ///
    /// Fails with [`LinkError::QueryParse`] if the query cannot be parsed.
    fn free_text_search(&self, query: &str, profile: &AnalysisProfile) -> Result<FreeTextResult>;

    fn fetch(&self, handle: ResultHandle) -> Result<IndexedRecord>;

    /// Releases the index. Idempotent.
    fn close(&mut self);
}

/// [`SearchGateway`] over a SQLite link index.
pub struct SqliteGateway {
    db: Option<IndexDatabase>,
}

impl SqliteGateway {
    pub fn new(db: IndexDatabase) -> Self {
        Self { db: Some(db) }
    }

    pub fn is_open(&self) -> bool {
        self.db.is_some()
    }

    fn db(&self, operation: &str) -> Result<&IndexDatabase> {
        self.db.as_ref().ok_or_else(|| LinkError::Index {
            message: "index is closed".to_string(),
            operation: operation.to_string(),
        })
    }
}

/// SQL predicate over `records r` for one clause.
fn clause_condition(field: SearchField) -> &'static str {
    match field {
        SearchField::CollectionId => "r.collection_id = ?",
        SearchField::Level => "r.level = ?",
        SearchField::Destinations => {
            "EXISTS (SELECT 1 FROM destinations d WHERE d.record_id = r.id AND d.name = ?)"
        }
    }
}

/// Builds the top-1 SQL statement and its parameters for a structured search.
fn structured_sql(clauses: &[Clause]) -> (String, Vec<String>) {
    let (must, should): (Vec<&Clause>, Vec<&Clause>) = clauses
        .iter()
        .partition(|c| c.requirement == Requirement::Must);

    let mut conditions = Vec::new();
    let mut params = Vec::new();

    for clause in &must {
        conditions.push(clause_condition(clause.field).to_string());
        params.push(clause.value.clone());
    }

    if must.is_empty() && !should.is_empty() {
        let any: Vec<&str> = should.iter().map(|c| clause_condition(c.field)).collect();
        conditions.push(format!("({})", any.join(" OR ")));
        params.extend(should.iter().map(|c| c.value.clone()));
    }

    let mut sql = String::from("SELECT r.id FROM records r");
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    sql.push_str(" ORDER BY ");
    if !should.is_empty() {
        let score: Vec<String> = should
            .iter()
            .map(|c| format!("({})", clause_condition(c.field)))
            .collect();
        sql.push_str(&score.join(" + "));
        sql.push_str(" DESC, ");
        params.extend(should.iter().map(|c| c.value.clone()));
    }
    sql.push_str("r.id LIMIT 1");

    (sql, params)
}

/// Quotes a term for an FTS5 MATCH expression.
fn fts_phrase(text: &str, prefix: bool) -> String {
    let quoted = format!("\"{}\"", text.replace('"', "\"\""));
    if prefix {
        format!("{quoted} *")
    } else {
        quoted
    }
}

fn compile_leaf(
    field: &str,
    analysis: FieldAnalysis,
    text: &str,
    prefix: bool,
    params: &mut Vec<String>,
) -> String {
    match analysis {
        FieldAnalysis::Text => {
            params.push(fts_phrase(text, prefix));
            params.push(field.to_string());
            "SELECT record_id FROM record_text WHERE record_text MATCH ? AND field = ?".to_string()
        }
        FieldAnalysis::Exact => {
            params.push(field.to_string());
            params.push(text.to_string());
            "SELECT record_id FROM record_fields WHERE field = ? AND value = ?".to_string()
        }
    }
}

/// Compiles a query into a compound SELECT yielding matching record ids.
///
/// Parameters are appended in the order their placeholders appear.
fn compile_query(node: &QueryNode, params: &mut Vec<String>) -> String {
    match node {
        QueryNode::Term {
            field,
            analysis,
            text,
            prefix,
        } => compile_leaf(field, *analysis, text, *prefix, params),
        QueryNode::Phrase {
            field,
            analysis,
            text,
        } => compile_leaf(field, *analysis, text, false, params),
        QueryNode::Or(items) => items
            .iter()
            .map(|item| format!("SELECT record_id FROM ({})", compile_query(item, params)))
            .collect::<Vec<_>>()
            .join(" UNION "),
        QueryNode::And(items) => {
            let (negative, positive): (Vec<&QueryNode>, Vec<&QueryNode>) =
                items.iter().partition(|i| matches!(i, QueryNode::Not(_)));
            let mut sql = positive
                .iter()
                .map(|item| format!("SELECT record_id FROM ({})", compile_query(item, params)))
                .collect::<Vec<_>>()
                .join(" INTERSECT ");
            for item in negative {
                sql.push_str(" EXCEPT ");
                sql.push_str(&format!("SELECT record_id FROM ({})", compile_query(item, params)));
            }
            sql
        }
        // Only reachable inside a conjunction, where it becomes an EXCEPT.
        QueryNode::Not(inner) => compile_query(inner, params),
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<IndexedRecord> {
    Ok(IndexedRecord {
        collection_id: row.get("collection_id")?,
        level: row.get("level")?,
        xml: row.get("xml")?,
        relative_path: row.get("relative_path")?,
        uri_fragment: row.get("uri_fragment")?,
        destinations: Vec::new(),
    })
}

impl SearchGateway for SqliteGateway {
    fn structured_search(&self, clauses: &[Clause]) -> Result<Option<ResultHandle>> {
        if clauses.is_empty() {
            return Ok(None);
        }
        let db = self.db("structured_search")?;
        let (sql, params) = structured_sql(clauses);

        db.conn()
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get::<_, i64>(0))
            .optional()
            .map(|id| id.map(ResultHandle))
            .map_err(|e| LinkError::Index {
                message: format!("structured search failed: {e}"),
                operation: "structured_search".to_string(),
            })
    }

    fn free_text_search(&self, query: &str, profile: &AnalysisProfile) -> Result<FreeTextResult> {
        let parsed = parse_query(query, profile)?;
        let db = self.db("free_text_search")?;

        let mut params = vec![profile.collection_id().to_string(), ROOT_LEVEL.to_string()];
        let matches = compile_query(&parsed, &mut params);
        let sql = format!(
            "SELECT r.id FROM records r
             WHERE r.collection_id = ? AND r.level <> ? AND r.id IN ({matches})
             ORDER BY r.id LIMIT 1"
        );

        let hit = db
            .conn()
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get::<_, i64>(0))
            .optional()
            .map_err(|e| LinkError::Index {
                message: format!("free-text search failed: {e}"),
                operation: "free_text_search".to_string(),
            })?;

        Ok(FreeTextResult {
            normalized: parsed.to_string(),
            hit: hit.map(ResultHandle),
        })
    }

    fn fetch(&self, handle: ResultHandle) -> Result<IndexedRecord> {
        let db = self.db("fetch")?;
        let map_err = |e: rusqlite::Error| LinkError::Index {
            message: format!("failed to fetch record {}: {e}", handle.0),
            operation: "fetch".to_string(),
        };

        let mut record = db
            .conn()
            .query_row(
                "SELECT collection_id, level, xml, relative_path, uri_fragment
                 FROM records WHERE id = ?1",
                params![handle.0],
                row_to_record,
            )
            .map_err(map_err)?;

        let mut stmt = db
            .conn()
            .prepare_cached("SELECT name FROM destinations WHERE record_id = ?1 ORDER BY rowid")
            .map_err(map_err)?;
        let names = stmt
            .query_map(params![handle.0], |row| row.get::<_, String>(0))
            .map_err(map_err)?;
        for name in names {
            record.destinations.push(name.map_err(map_err)?);
        }

        Ok(record)
    }

    fn close(&mut self) {
        if let Some(db) = self.db.take() {
            db.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_sql_must_only() {
        let (sql, params) = structured_sql(&[
            Clause::must(SearchField::CollectionId, "a"),
            Clause::must(SearchField::Level, "root"),
        ]);
        assert_eq!(
            sql,
            "SELECT r.id FROM records r WHERE r.collection_id = ? AND r.level = ? ORDER BY r.id LIMIT 1"
        );
        assert_eq!(params, vec!["a", "root"]);
    }

    #[test]
    fn test_structured_sql_should_ranks_after_must() {
        let (sql, params) = structured_sql(&[
            Clause::should(SearchField::CollectionId, "a"),
            Clause::must(SearchField::Destinations, "intro"),
        ]);
        assert!(sql.contains("WHERE EXISTS"));
        assert!(sql.contains("ORDER BY (r.collection_id = ?) DESC, r.id"));
        assert_eq!(params, vec!["intro", "a"]);
    }

    #[test]
    fn test_structured_sql_should_only_requires_one() {
        let (sql, params) = structured_sql(&[
            Clause::should(SearchField::CollectionId, "a"),
            Clause::should(SearchField::CollectionId, "b"),
        ]);
        assert!(sql.contains("WHERE (r.collection_id = ? OR r.collection_id = ?)"));
        assert_eq!(params, vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_fts_phrase_escapes_quotes() {
        assert_eq!(fts_phrase("say \"hi\"", false), "\"say \"\"hi\"\"\"");
        assert_eq!(fts_phrase("intro", true), "\"intro\" *");
    }
}
