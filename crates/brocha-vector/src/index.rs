//! In-memory vector index with brute-force cosine similarity search,
//! partitioned by named collection.
//!
//! Search is O(n) in the size of the queried collection, which is fine for
//! a store's worth of guides and products.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use brocha_core::error::BrochaError;

/// A single hit returned from a vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: Uuid,
    pub text: String,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f64,
}

/// Nearest-neighbour lookup over a named collection of passages.
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// Return up to `k` passages from `collection` ordered by descending
    /// similarity to `embedding`. An unknown collection yields no hits.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, BrochaError>;
}

#[derive(Debug, Clone)]
struct VectorEntry {
    id: Uuid,
    text: String,
    embedding: Vec<f32>,
}

/// In-memory vector index using brute-force cosine similarity.
///
/// Thread-safe via interior RwLock; clones share the same storage. Entries
/// keep insertion order within a collection so ties break stably.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    collections: Arc<RwLock<HashMap<String, Vec<VectorEntry>>>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a passage into a collection, creating the collection on demand.
    ///
    /// Overwrites any existing entry with the same ID in that collection.
    pub fn insert(
        &self,
        collection: &str,
        id: Uuid,
        text: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Result<(), BrochaError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| BrochaError::Search(format!("Lock poisoned: {}", e)))?;
        let entries = collections.entry(collection.to_string()).or_default();
        let entry = VectorEntry {
            id,
            text: text.into(),
            embedding,
        };
        match entries.iter_mut().find(|e| e.id == id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    /// Search a collection for the k nearest neighbours to the query vector.
    pub fn search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, BrochaError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| BrochaError::Search(format!("Lock poisoned: {}", e)))?;

        let Some(entries) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<SearchHit> = entries
            .iter()
            .map(|entry| SearchHit {
                id: entry.id,
                text: entry.text.clone(),
                score: cosine_similarity(query, &entry.embedding),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored)
    }

    /// Drop a whole collection. Returns how many entries it held.
    pub fn clear_collection(&self, collection: &str) -> Result<usize, BrochaError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| BrochaError::Search(format!("Lock poisoned: {}", e)))?;
        Ok(collections.remove(collection).map(|e| e.len()).unwrap_or(0))
    }

    /// Number of entries in one collection.
    pub fn collection_len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of entries across all collections.
    pub fn len(&self) -> usize {
        self.collections
            .read()
            .map(|c| c.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KnowledgeIndex for VectorIndex {
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, BrochaError> {
        self.search(collection, embedding, k)
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if the lengths differ or either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_search_orders_by_similarity() {
        let index = VectorIndex::new();
        index.insert("guias", Uuid::new_v4(), "lejos", vec![0.0, 1.0]).unwrap();
        index.insert("guias", Uuid::new_v4(), "cerca", vec![1.0, 0.1]).unwrap();
        index.insert("guias", Uuid::new_v4(), "exacto", vec![1.0, 0.0]).unwrap();

        let hits = index.search("guias", &[1.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "exacto");
        assert_eq!(hits[1].text, "cerca");
        assert!((hits[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_collections_are_isolated() {
        let index = VectorIndex::new();
        index.insert("guias", Uuid::new_v4(), "guia", vec![1.0, 0.0]).unwrap();
        index.insert("productos", Uuid::new_v4(), "producto", vec![1.0, 0.0]).unwrap();

        let hits = index.search("productos", &[1.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "producto");
        assert_eq!(index.collection_len("guias"), 1);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_unknown_collection_is_empty() {
        let index = VectorIndex::new();
        assert!(index.search("nada", &[1.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_insert_same_id_overwrites() {
        let index = VectorIndex::new();
        let id = Uuid::new_v4();
        index.insert("guias", id, "viejo", vec![1.0]).unwrap();
        index.insert("guias", id, "nuevo", vec![1.0]).unwrap();

        let hits = index.search("guias", &[1.0], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "nuevo");
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = VectorIndex::new();
        for text in ["uno", "dos", "tres"] {
            index.insert("guias", Uuid::new_v4(), text, vec![1.0, 1.0]).unwrap();
        }
        let texts: Vec<String> = index
            .search("guias", &[1.0, 1.0], 3)
            .unwrap()
            .into_iter()
            .map(|h| h.text)
            .collect();
        assert_eq!(texts, vec!["uno", "dos", "tres"]);
    }

    #[test]
    fn test_clear_collection() {
        let index = VectorIndex::new();
        index.insert("productos", Uuid::new_v4(), "a", vec![1.0]).unwrap();
        index.insert("productos", Uuid::new_v4(), "b", vec![1.0]).unwrap();
        assert_eq!(index.clear_collection("productos").unwrap(), 2);
        assert!(index.is_empty());
        assert_eq!(index.clear_collection("productos").unwrap(), 0);
    }

    #[test]
    fn test_clones_share_storage() {
        let index = VectorIndex::new();
        let clone = index.clone();
        clone.insert("guias", Uuid::new_v4(), "x", vec![1.0]).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_query_through_trait() {
        let index = VectorIndex::new();
        index.insert("guias", Uuid::new_v4(), "rodillo", vec![0.6, 0.8]).unwrap();
        let dyn_index: &dyn KnowledgeIndex = &index;
        let hits = dyn_index.query("guias", &[0.6, 0.8], 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "rodillo");
    }
}
