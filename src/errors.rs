use thiserror::Error;

use crate::analysis::QueryParseError;

/// Errors that can occur while resolving links for an export run.
///
/// Per-link failures (no result, out-of-scope collection, unparseable query)
/// are not errors; they are reported as a [`crate::types::ResolutionOutcome`].
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("missing prerequisite: {message}")]
    MissingPrerequisite { message: String },

    #[error("index error: {message} (operation: {operation})")]
    Index { message: String, operation: String },

    #[error("markup error: {message} (document: {document})")]
    Markup { message: String, document: String },

    #[error("query parse error: {0}")]
    QueryParse(#[from] QueryParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience alias for results using `LinkError`.
pub type Result<T> = std::result::Result<T, LinkError>;
