//! Error types for the dialogue layer.
//!
//! None of these reach the customer: the orchestrator turns every fault into
//! a fixed Spanish reply. They exist so each stage can report what failed.

use brocha_llm::ProviderError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ChatError {
    /// The classifier could not produce an intent. Recovered as UNKNOWN.
    #[error("classification error: {0}")]
    Classification(String),
    /// Embedding, index lookup or generation failed while answering from the
    /// knowledge base.
    #[error("retrieval error: {0}")]
    Retrieval(String),
    /// The catalog query failed. Recovered into a user-facing string.
    #[error("structured query error: {0}")]
    StructuredQuery(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("memory error: {0}")]
    Memory(String),
}

impl From<ProviderError> for ChatError {
    fn from(err: ProviderError) -> Self {
        ChatError::Provider(err.to_string())
    }
}
