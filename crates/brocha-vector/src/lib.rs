//! Brocha Vector crate - knowledge index, text splitting and ingestion.
//!
//! Provides a collection-partitioned cosine-similarity index behind the
//! [`KnowledgeIndex`] trait, a SQLite-backed [`VectorStore`] that survives
//! restarts, and the [`DocumentIngester`] used by the offline commands.

pub mod index;
pub mod ingest;
pub mod splitter;
pub mod store;

pub use index::{KnowledgeIndex, SearchHit, VectorIndex};
pub use ingest::{DocumentIngester, IngestReport};
pub use splitter::TextSplitter;
pub use store::VectorStore;
