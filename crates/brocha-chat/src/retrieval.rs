//! Knowledge-base answers.
//!
//! Candidates come from the vector index, each one is scored by the
//! generator, and only passages at or above the threshold reach the final
//! answer prompt.

use std::sync::Arc;

use tracing::{debug, info, warn};

use brocha_core::config::RetrievalConfig;
use brocha_core::types::{Message, RetrievedPassage};
use brocha_llm::{EmbeddingProvider, TextGenerationProvider};
use brocha_vector::KnowledgeIndex;

use crate::error::ChatError;
use crate::prompts;

pub struct RetrievalAnswerer {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn KnowledgeIndex>,
    generator: Arc<dyn TextGenerationProvider>,
    collection: String,
    top_k: usize,
    threshold: f64,
}

impl RetrievalAnswerer {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn KnowledgeIndex>,
        generator: Arc<dyn TextGenerationProvider>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            collection: config.collection.clone(),
            top_k: config.top_k.max(1),
            threshold: config.relevance_threshold,
        }
    }

    /// Candidates that pass the relevance judgment, in retrieval order.
    pub async fn relevant_passages(
        &self,
        question: &str,
    ) -> Result<Vec<RetrievedPassage>, ChatError> {
        let embedding = self
            .embedder
            .embed(question)
            .await
            .map_err(|e| ChatError::Retrieval(format!("embedding failed: {}", e)))?;
        let hits = self
            .index
            .query(&self.collection, &embedding, self.top_k)
            .await
            .map_err(|e| ChatError::Retrieval(format!("index query failed: {}", e)))?;
        debug!(collection = %self.collection, candidates = hits.len(), "Knowledge candidates fetched");

        let mut passages = Vec::new();
        for hit in hits {
            let Some(score) = self.judge(question, &hit.text).await? else {
                continue;
            };
            if score >= self.threshold {
                passages.push(RetrievedPassage {
                    text: hit.text,
                    relevance_score: score,
                });
            } else {
                debug!(score, threshold = self.threshold, "Passage below relevance threshold");
            }
        }
        Ok(passages)
    }

    /// Answer `question` from the knowledge base. `history_context` is the
    /// prior conversation rendered as `role: content` lines.
    pub async fn answer(&self, question: &str, history_context: &str) -> Result<String, ChatError> {
        let passages = self.relevant_passages(question).await?;
        if passages.is_empty() {
            info!(collection = %self.collection, "No relevant passages, declining to answer");
            return Ok(prompts::NO_INFORMATION.to_string());
        }

        let documents = passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let system = prompts::expert_answer(history_context, &documents);
        let reply = self
            .generator
            .generate(&system, &[Message::user(question)])
            .await
            .map_err(|e| ChatError::Retrieval(format!("generation failed: {}", e)))?;
        info!(passages = passages.len(), "Knowledge answer generated");
        Ok(reply)
    }

    /// Ask the generator how relevant `passage` is. `None` when the reply is
    /// not a number in `[0, 1]`.
    async fn judge(&self, question: &str, passage: &str) -> Result<Option<f64>, ChatError> {
        let system = prompts::relevance_judgment(question, passage);
        let reply = self
            .generator
            .generate(&system, &[Message::user(prompts::RELEVANCE_QUESTION)])
            .await
            .map_err(|e| ChatError::Retrieval(format!("relevance judgment failed: {}", e)))?;

        match parse_score(&reply) {
            Some(score) if (0.0..=1.0).contains(&score) => Ok(Some(score)),
            _ => {
                warn!(reply = %reply, "Discarding passage with unusable relevance judgment");
                Ok(None)
            }
        }
    }
}

/// The reply read as a bare number, accepting a comma as decimal separator
/// and a trailing full stop. Anything else around the number is rejected.
pub fn parse_score(reply: &str) -> Option<f64> {
    let trimmed = reply.trim();
    let number = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }
    if number.matches(['.', ',']).count() > 1 {
        return None;
    }
    number.replace(',', ".").parse().ok()
}
