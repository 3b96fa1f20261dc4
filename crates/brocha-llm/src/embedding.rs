//! Offline embedding backend.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::EmbeddingProvider;

/// Deterministic bag-of-words embedder.
///
/// Each lower-cased word is hashed into one of `dimensions` buckets and the
/// resulting count vector is L2-normalised, so texts sharing words land close
/// together under cosine similarity. Identical inputs always produce
/// identical outputs. Vectors are not comparable with a real model's.
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimensions: usize,
}

impl HashEmbedding {
    pub const DEFAULT_DIMENSIONS: usize = 384;

    pub fn new() -> Self {
        Self::with_dimensions(Self::DEFAULT_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimensions as u64) as usize;
            result[bucket] += 1.0;
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }
        result
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_dimension() {
        let service = HashEmbedding::new();
        let v = service.embed("rodillo").await.unwrap();
        assert_eq!(v.len(), 384);
        assert_eq!(service.dimensions(), 384);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let service = HashEmbedding::new();
        let a = service.embed("Cómo pintar una pared").await.unwrap();
        let b = service.embed("Cómo pintar una pared").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_unit_length() {
        let service = HashEmbedding::with_dimensions(64);
        let v = service.embed("lijar masillar pintar").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_case_insensitive_words() {
        let service = HashEmbedding::new();
        let a = service.embed("Latex Blanco").await.unwrap();
        let b = service.embed("latex blanco").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_shared_words_score_higher() {
        let service = HashEmbedding::new();
        let query = service.embed("pintar pared interior").await.unwrap();
        let close = service
            .embed("para pintar una pared interior use latex")
            .await
            .unwrap();
        let far = service.embed("horario de atención sábados").await.unwrap();
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let service = HashEmbedding::new();
        assert!(service.embed("  ").await.is_err());
        assert!(service.embed_document("").await.is_err());
    }
}
