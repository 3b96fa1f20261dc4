//! Persistence for knowledge chunks and their embeddings.
//!
//! Embeddings are stored as little-endian `f32` blobs so the in-memory index
//! can be rebuilt on start-up without calling the embedding provider again.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use brocha_core::error::BrochaError;

use crate::db::Database;

/// A stored chunk of a knowledge document.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeChunk {
    pub id: Uuid,
    pub collection: String,
    pub text: String,
    pub embedding: Vec<f32>,
    /// File or table the chunk came from.
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeChunk {
    pub fn new(
        collection: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection: collection.into(),
            text: text.into(),
            embedding,
            source: source.into(),
            created_at: Utc::now(),
        }
    }
}

/// Repository for the `knowledge_chunks` table.
pub struct KnowledgeRepository {
    db: Arc<Database>,
}

impl KnowledgeRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn save(&self, chunk: &KnowledgeChunk) -> Result<(), BrochaError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO knowledge_chunks (id, collection, text, embedding, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    chunk.id.to_string(),
                    chunk.collection,
                    chunk.text,
                    encode_embedding(&chunk.embedding),
                    chunk.source,
                    chunk.created_at.timestamp(),
                ],
            )
            .map_err(|e| BrochaError::Storage(format!("Failed to save chunk: {}", e)))?;
            Ok(())
        })
    }

    /// Load every chunk, oldest first.
    pub fn load_all(&self) -> Result<Vec<KnowledgeChunk>, BrochaError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, collection, text, embedding, source, created_at
                     FROM knowledge_chunks
                     ORDER BY created_at ASC, rowid ASC",
                )
                .map_err(|e| BrochaError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| Ok(row_to_chunk(row)))
                .map_err(|e| BrochaError::Storage(e.to_string()))?;

            let mut chunks = Vec::new();
            for row in rows {
                let chunk = row.map_err(|e| BrochaError::Storage(e.to_string()))??;
                chunks.push(chunk);
            }
            Ok(chunks)
        })
    }

    /// Delete every chunk of a collection. Returns the number removed.
    pub fn delete_collection(&self, collection: &str) -> Result<usize, BrochaError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM knowledge_chunks WHERE collection = ?1",
                rusqlite::params![collection],
            )
            .map_err(|e| BrochaError::Storage(format!("Failed to delete collection: {}", e)))
        })
    }

    pub fn count(&self, collection: &str) -> Result<u64, BrochaError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM knowledge_chunks WHERE collection = ?1",
                    rusqlite::params![collection],
                    |row| row.get(0),
                )
                .map_err(|e| BrochaError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> Result<KnowledgeChunk, BrochaError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| BrochaError::Storage(e.to_string()))?;
    let blob: Vec<u8> = row
        .get(3)
        .map_err(|e| BrochaError::Storage(e.to_string()))?;
    let ts: i64 = row
        .get(5)
        .map_err(|e| BrochaError::Storage(e.to_string()))?;

    Ok(KnowledgeChunk {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| BrochaError::Storage(format!("Invalid chunk id: {}", e)))?,
        collection: row
            .get(1)
            .map_err(|e| BrochaError::Storage(e.to_string()))?,
        text: row
            .get(2)
            .map_err(|e| BrochaError::Storage(e.to_string()))?,
        embedding: decode_embedding(&blob)?,
        source: row
            .get(4)
            .map_err(|e| BrochaError::Storage(e.to_string()))?,
        created_at: Utc
            .timestamp_opt(ts, 0)
            .single()
            .unwrap_or_else(Utc::now),
    })
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>, BrochaError> {
    if blob.len() % 4 != 0 {
        return Err(BrochaError::Storage(format!(
            "Embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_repo() -> KnowledgeRepository {
        KnowledgeRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    #[test]
    fn test_save_and_load() {
        let repo = make_repo();
        let chunk = KnowledgeChunk::new(
            "guias",
            "Lijar la superficie antes de pintar.",
            vec![0.25, -1.5, 3.0],
            "guia_latex.md",
        );
        repo.save(&chunk).unwrap();

        let loaded = repo.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, chunk.id);
        assert_eq!(loaded[0].collection, "guias");
        assert_eq!(loaded[0].embedding, vec![0.25, -1.5, 3.0]);
        assert_eq!(loaded[0].source, "guia_latex.md");
        assert_eq!(loaded[0].created_at.timestamp(), chunk.created_at.timestamp());
    }

    #[test]
    fn test_count_and_delete_per_collection() {
        let repo = make_repo();
        repo.save(&KnowledgeChunk::new("guias", "a", vec![1.0], "x")).unwrap();
        repo.save(&KnowledgeChunk::new("guias", "b", vec![1.0], "x")).unwrap();
        repo.save(&KnowledgeChunk::new("productos", "c", vec![1.0], "db")).unwrap();

        assert_eq!(repo.count("guias").unwrap(), 2);
        assert_eq!(repo.delete_collection("guias").unwrap(), 2);
        assert_eq!(repo.count("guias").unwrap(), 0);
        assert_eq!(repo.count("productos").unwrap(), 1);
    }

    #[test]
    fn test_load_preserves_insertion_order() {
        let repo = make_repo();
        for text in ["primero", "segundo", "tercero"] {
            repo.save(&KnowledgeChunk::new("guias", text, vec![0.0], "x")).unwrap();
        }
        let texts: Vec<String> = repo.load_all().unwrap().into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["primero", "segundo", "tercero"]);
    }

    #[test]
    fn test_decode_rejects_truncated_blob() {
        assert!(decode_embedding(&[0, 0, 128]).is_err());
        assert_eq!(decode_embedding(&[]).unwrap(), Vec::<f32>::new());
    }
}
