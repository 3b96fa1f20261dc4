//! Persistent vector store: the in-memory index plus write-through to the
//! `knowledge_chunks` table.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use brocha_core::error::BrochaError;
use brocha_storage::{Database, KnowledgeChunk, KnowledgeRepository};

use crate::index::{KnowledgeIndex, SearchHit, VectorIndex};

pub struct VectorStore {
    index: VectorIndex,
    repo: Option<KnowledgeRepository>,
}

impl VectorStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            index: VectorIndex::new(),
            repo: None,
        }
    }

    /// Hydrate the index from every chunk persisted in `db`.
    pub fn load(db: Arc<Database>) -> Result<Self, BrochaError> {
        let repo = KnowledgeRepository::new(db);
        let index = VectorIndex::new();
        let chunks = repo.load_all()?;
        let count = chunks.len();
        for chunk in chunks {
            index.insert(&chunk.collection, chunk.id, chunk.text, chunk.embedding)?;
        }
        info!(chunks = count, "Knowledge index loaded");

        Ok(Self {
            index,
            repo: Some(repo),
        })
    }

    /// Persist (when backed by a database) and index one passage.
    pub fn insert(
        &self,
        collection: &str,
        text: &str,
        embedding: Vec<f32>,
        source: &str,
    ) -> Result<Uuid, BrochaError> {
        let chunk = KnowledgeChunk::new(collection, text, embedding, source);
        if let Some(repo) = &self.repo {
            repo.save(&chunk)?;
        }
        self.index
            .insert(collection, chunk.id, chunk.text, chunk.embedding)?;
        Ok(chunk.id)
    }

    /// Remove a collection from the index and the database.
    pub fn delete_collection(&self, collection: &str) -> Result<usize, BrochaError> {
        let removed = self.index.clear_collection(collection)?;
        if let Some(repo) = &self.repo {
            repo.delete_collection(collection)?;
        }
        Ok(removed)
    }

    pub fn collection_len(&self, collection: &str) -> usize {
        self.index.collection_len(collection)
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

#[async_trait]
impl KnowledgeIndex for VectorStore {
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, BrochaError> {
        self.index.search(collection, embedding, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_insert_and_query() {
        let store = VectorStore::in_memory();
        store.insert("guias", "usar rodillo", vec![1.0, 0.0], "a.md").unwrap();
        assert_eq!(store.collection_len("guias"), 1);
        let hits = store.index().search("guias", &[1.0, 0.0], 3).unwrap();
        assert_eq!(hits[0].text, "usar rodillo");
    }

    #[test]
    fn test_load_restores_persisted_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brocha.db");
        {
            let db = Arc::new(Database::new(&path).unwrap());
            let store = VectorStore::load(db).unwrap();
            store.insert("guias", "lijar primero", vec![0.0, 1.0], "g.md").unwrap();
            store.insert("productos", "Alba Latex", vec![1.0, 0.0], "catalog").unwrap();
        }

        let db = Arc::new(Database::new(&path).unwrap());
        let store = VectorStore::load(db).unwrap();
        assert_eq!(store.collection_len("guias"), 1);
        assert_eq!(store.collection_len("productos"), 1);
        let hits = store.index().search("guias", &[0.0, 1.0], 1).unwrap();
        assert_eq!(hits[0].text, "lijar primero");
    }

    #[test]
    fn test_delete_collection_removes_from_disk() {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = VectorStore::load(db.clone()).unwrap();
        store.insert("productos", "a", vec![1.0], "catalog").unwrap();
        store.insert("productos", "b", vec![1.0], "catalog").unwrap();

        assert_eq!(store.delete_collection("productos").unwrap(), 2);
        assert_eq!(KnowledgeRepository::new(db).count("productos").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_through_trait() {
        let store = VectorStore::in_memory();
        store.insert("guias", "brocha", vec![0.0, 1.0], "x").unwrap();
        let hits = store.query("guias", &[0.0, 1.0], 3).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
