//! Brocha Storage crate - SQLite persistence for the product catalog and
//! the knowledge chunks behind the vector index.

pub mod catalog;
pub mod db;
pub mod knowledge;
pub mod migrations;

pub use catalog::{Catalog, ImportReport, ProductDocument, ProductRecord, RelationalStore, Row};
pub use db::Database;
pub use knowledge::{KnowledgeChunk, KnowledgeRepository};
