//! Provider traits consumed by the dialogue layer.

use async_trait::async_trait;

use brocha_core::types::Message;

use crate::error::ProviderError;

/// One turn handed to the generator. Same shape as a stored message.
pub type Turn = Message;

/// A chat-style text generator.
#[async_trait]
pub trait TextGenerationProvider: Send + Sync {
    /// Generate a reply given system instructions and the conversation turns.
    async fn generate(&self, system: &str, turns: &[Turn]) -> Result<String, ProviderError>;

    /// Provider name for log fields.
    fn name(&self) -> &'static str;
}

/// Produces fixed-dimension embedding vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a search query.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed a document for indexing. Providers that distinguish query and
    /// document inputs override this.
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed(text).await
    }

    fn dimensions(&self) -> usize;
}
