pub mod analysis;
pub mod config;
pub mod errors;
pub mod export;
pub mod index;
pub mod markup;
pub mod report;
pub mod resolution;
pub mod session;
pub mod types;
