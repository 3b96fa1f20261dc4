//! Brocha LLM crate - text generation and embedding providers.
//!
//! The dialogue layer only sees the [`TextGenerationProvider`] and
//! [`EmbeddingProvider`] traits; [`CohereClient`] is the production backend
//! and [`HashEmbedding`] an offline embedder for tests and dry runs.

pub mod cohere;
pub mod embedding;
pub mod error;
pub mod json;
pub mod provider;

pub use cohere::{CohereClient, HttpSettings};
pub use embedding::HashEmbedding;
pub use error::ProviderError;
pub use json::extract_json_from_response;
pub use provider::{EmbeddingProvider, TextGenerationProvider, Turn};
