/// SQLite connection management for the link index.
pub mod connection;

/// Search access used during link resolution.
pub mod gateway;

/// Record insertion used by the indexing stage and fixtures.
pub mod writer;

pub use connection::IndexDatabase;
pub use gateway::{FreeTextResult, SearchGateway, SqliteGateway};
pub use writer::{IndexStats, RecordInput};
