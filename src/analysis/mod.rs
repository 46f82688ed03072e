/// Free-text query parsing under per-collection analysis profiles.
///
/// Each collection's root record declares its searchable fields; the cache
/// loads one profile per configured collection before any document is
/// processed.
mod cache;
mod profile;
mod query;

pub use cache::TextAnalysisCache;
pub use profile::{AnalysisProfile, FieldAnalysis, DEFAULT_FIELD};
pub use query::{parse_query, QueryNode, QueryParseError};
