//! Cohere client (v2 chat and embed endpoints).

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use brocha_core::config::LlmConfig;

use crate::error::ProviderError;
use crate::provider::{EmbeddingProvider, TextGenerationProvider, Turn};

/// HTTP client configuration for provider calls.
#[derive(Debug, Clone, Copy)]
pub struct HttpSettings {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl From<&LlmConfig> for HttpSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            connect_timeout_ms: config.connect_timeout_ms,
        }
    }
}

/// Build a reqwest client honouring the configured timeouts.
pub fn build_http_client(settings: HttpSettings) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if settings.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(settings.timeout_ms));
    }
    if settings.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(settings.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        warn!("Failed to build provider HTTP client: {err}");
        reqwest::Client::new()
    })
}

/// Cohere generation and embedding client.
pub struct CohereClient {
    api_key: String,
    endpoint: String,
    chat_model: String,
    embed_model: String,
    temperature: f32,
    seed: Option<u64>,
    client: reqwest::Client,
}

impl CohereClient {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.cohere.com";
    pub const DEFAULT_CHAT_MODEL: &'static str = "command-r-plus-08-2024";
    pub const DEFAULT_EMBED_MODEL: &'static str = "embed-multilingual-v3.0";

    /// Dimensionality of `embed-multilingual-v3.0` vectors.
    pub const EMBED_DIMENSIONS: usize = 1024;

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            chat_model: Self::DEFAULT_CHAT_MODEL.to_string(),
            embed_model: Self::DEFAULT_EMBED_MODEL.to_string(),
            temperature: 0.3,
            seed: Some(42),
            client: build_http_client(HttpSettings::default()),
        }
    }

    /// Build a client from the `[llm]` section, reading the key from the
    /// configured environment variable.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        if config.provider != "cohere" {
            return Err(ProviderError::NotConfigured(format!(
                "unsupported provider '{}'",
                config.provider
            )));
        }
        let api_key = config
            .api_key()
            .map_err(|e| ProviderError::NotConfigured(e.to_string()))?;

        Ok(Self {
            api_key,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embed_model: config.embed_model.clone(),
            temperature: config.temperature,
            seed: config.seed,
            client: build_http_client(HttpSettings::from(config)),
        })
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_http_settings(mut self, settings: HttpSettings) -> Self {
        self.client = build_http_client(settings);
        self
    }

    fn chat_request(&self, system: &str, turns: &[Turn]) -> ChatRequest {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.extend(turns.iter().map(|turn| ChatMessage {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }));

        ChatRequest {
            model: self.chat_model.clone(),
            messages,
            temperature: Some(self.temperature),
            seed: self.seed,
        }
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req, model: &str) -> Result<Resp, ProviderError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.endpoint, path);
        let result: Result<Resp, ProviderError> = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .header("Accept", "application/json")
                .json(body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            response
                .json::<Resp>()
                .await
                .map_err(|e| ProviderError::Decode(e.to_string()))
        }
        .await;

        if let Err(err) = &result {
            warn!(
                provider = "cohere",
                model,
                path,
                error_kind = err.kind(),
                error = %err,
                "Cohere request failed"
            );
        }
        result
    }

    async fn embed_with(&self, text: &str, input_type: &str) -> Result<Vec<f32>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        let request = EmbedRequest {
            model: self.embed_model.clone(),
            texts: vec![text.to_string()],
            input_type: input_type.to_string(),
            embedding_types: vec!["float".to_string()],
        };
        let response: EmbedResponse = self.post("/v2/embed", &request, &self.embed_model).await?;
        response.into_first()
    }
}

impl std::fmt::Debug for CohereClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CohereClient")
            .field("endpoint", &self.endpoint)
            .field("chat_model", &self.chat_model)
            .field("embed_model", &self.embed_model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TextGenerationProvider for CohereClient {
    async fn generate(&self, system: &str, turns: &[Turn]) -> Result<String, ProviderError> {
        let request = self.chat_request(system, turns);
        debug!(
            provider = "cohere",
            model = %self.chat_model,
            turns = turns.len(),
            "Sending chat request"
        );
        let response: ChatResponse = self.post("/v2/chat", &request, &self.chat_model).await?;
        response.into_text()
    }

    fn name(&self) -> &'static str {
        "cohere"
    }
}

#[async_trait]
impl EmbeddingProvider for CohereClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_with(text, "search_query").await
    }

    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_with(text, "search_document").await
    }

    fn dimensions(&self) -> usize {
        Self::EMBED_DIMENSIONS
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, ProviderError> {
        let text: String = self
            .message
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();
        if text.trim().is_empty() {
            Err(ProviderError::Empty)
        } else {
            Ok(text)
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    texts: Vec<String>,
    input_type: String,
    embedding_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: EmbeddingsByType,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsByType {
    #[serde(default)]
    float: Vec<Vec<f32>>,
}

impl EmbedResponse {
    fn into_first(self) -> Result<Vec<f32>, ProviderError> {
        self.embeddings
            .float
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(ProviderError::Empty)
    }
}
