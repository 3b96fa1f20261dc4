//! Route handler functions for all API endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use brocha_core::types::{Message, Role};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

/// Inbound message forwarded by the WhatsApp gateway.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub from_number: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl From<Message> for HistoryEntry {
    fn from(message: Message) -> Self {
        Self {
            role: message.role,
            content: message.content,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Conversations currently held in memory.
    pub active_conversations: usize,
}

// =============================================================================
// Handler functions
// =============================================================================

/// POST /whatsapp/webhook - answer one customer message.
pub async fn whatsapp_webhook(
    State(state): State<AppState>,
    Json(body): Json<WebhookRequest>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let from_number = body.from_number.trim();
    if from_number.is_empty() {
        return Err(ApiError::BadRequest(
            "'from_number' must not be empty".to_string(),
        ));
    }

    info!(from_number = %from_number, "Webhook message received");
    let reply = state
        .orchestrator
        .handle_message(from_number, &body.message)
        .await;

    Ok(Json(WebhookResponse {
        status: "success".to_string(),
        message: reply,
    }))
}

/// GET /chat/{user_id}/history - the stored conversation, oldest first.
pub async fn chat_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    if !state.orchestrator.memory().contains(&user_id) {
        return Err(ApiError::NotFound(format!("No conversation for user {}", user_id)));
    }

    let history = state
        .orchestrator
        .history(&user_id)?
        .into_iter()
        .map(HistoryEntry::from)
        .collect();
    Ok(Json(HistoryResponse { history }))
}

/// GET /health - liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_conversations: state.orchestrator.memory().len(),
    })
}
