use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::errors::{LinkError, Result};

/// The embedded SQL schema applied when initializing a new index.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// SQLite database holding the link index.
pub struct IndexDatabase {
    conn: Connection,
}

impl IndexDatabase {
    /// Creates a new index at `db_path`, creating parent directories if needed.
    ///
    /// Used by the indexing stage that precedes link resolution.
    pub fn initialize(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LinkError::Index {
                message: format!("failed to create index directory: {e}"),
                operation: "initialize".to_string(),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| LinkError::Index {
            message: format!("failed to open index: {e}"),
            operation: "initialize".to_string(),
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| LinkError::Index {
            message: format!("failed to apply pragmas: {e}"),
            operation: "initialize".to_string(),
        })?;

        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| LinkError::Index {
                message: format!("failed to apply schema: {e}"),
                operation: "initialize".to_string(),
            })?;

        Ok(Self { conn })
    }

    /// Opens an existing index for the duration of an export run.
    ///
    /// The connection is read-only; nothing writes to the index once
    /// resolution has started.
    pub fn open_read_only(db_path: &Path) -> Result<Self> {
        if !db_path.is_file() {
            return Err(LinkError::Index {
                message: format!("no index found at '{}'", db_path.display()),
                operation: "open".to_string(),
            });
        }

        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| LinkError::Index {
            message: format!("failed to open index: {e}"),
            operation: "open".to_string(),
        })?;

        conn.execute_batch(
            "PRAGMA query_only = ON;
             PRAGMA cache_size = -65536;
             PRAGMA temp_store = MEMORY;
             PRAGMA mmap_size = 268435456;",
        )
        .map_err(|e| LinkError::Index {
            message: format!("failed to apply pragmas: {e}"),
            operation: "open".to_string(),
        })?;

        // A file that is not a link index fails here rather than on the first link.
        conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get::<_, i64>(0))
            .map_err(|e| LinkError::Index {
                message: format!("not a link index: {e}"),
                operation: "open".to_string(),
            })?;

        Ok(Self { conn })
    }

    /// Returns a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the `IndexDatabase`, closing the underlying connection.
    pub fn close(self) {
        drop(self.conn);
    }
}
