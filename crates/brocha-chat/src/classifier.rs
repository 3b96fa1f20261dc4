//! Intent classification.
//!
//! Two strategies sit behind [`IntentClassifier`]: a single-call JSON router
//! (the default) and a two-stage keyword router. Neither ever fails: any
//! provider or parsing problem is logged and reported as `UNKNOWN`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use brocha_core::config::ClassifierStrategy;
use brocha_core::types::{clamp_unit, Intent, IntentMetadata, IntentType, Message};
use brocha_llm::{extract_json_from_response, TextGenerationProvider};

use crate::error::ChatError;
use crate::prompts;

/// Maps a free-text message to an [`Intent`].
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify `message`. `recent_context` holds the latest stored turns of
    /// the conversation, oldest first.
    async fn classify(&self, message: &str, recent_context: &[Message]) -> Intent;
}

/// Build the classifier selected by configuration.
pub fn build_classifier(
    strategy: ClassifierStrategy,
    generator: Arc<dyn TextGenerationProvider>,
) -> Arc<dyn IntentClassifier> {
    match strategy {
        ClassifierStrategy::Json => Arc::new(JsonIntentClassifier::new(generator)),
        ClassifierStrategy::TwoStage => Arc::new(TwoStageClassifier::new(generator)),
    }
}

// =============================================================================
// JSON router
// =============================================================================

/// Asks the generator for `{"type", "confidence", "metadata"}` in one call.
pub struct JsonIntentClassifier {
    generator: Arc<dyn TextGenerationProvider>,
}

impl JsonIntentClassifier {
    pub fn new(generator: Arc<dyn TextGenerationProvider>) -> Self {
        Self { generator }
    }

    async fn try_classify(
        &self,
        message: &str,
        recent_context: &[Message],
    ) -> Result<Intent, ChatError> {
        let turn = Message::user(render_with_context(message, recent_context));
        let reply = self
            .generator
            .generate(prompts::JSON_ROUTER, std::slice::from_ref(&turn))
            .await?;
        parse_intent(&reply)
    }
}

#[async_trait]
impl IntentClassifier for JsonIntentClassifier {
    async fn classify(&self, message: &str, recent_context: &[Message]) -> Intent {
        match self.try_classify(message, recent_context).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!(error = %e, "Intent classification failed, treating as UNKNOWN");
                Intent::unknown()
            }
        }
    }
}

/// Parse a router reply into an intent, clamping the confidence.
pub fn parse_intent(reply: &str) -> Result<Intent, ChatError> {
    let json = extract_json_from_response(reply);
    let mut intent: Intent = serde_json::from_str(json).map_err(|e| {
        ChatError::Classification(format!("invalid router reply ({}): {}", e, reply))
    })?;
    intent.confidence = clamp_unit(intent.confidence);
    Ok(intent)
}

fn render_with_context(message: &str, recent_context: &[Message]) -> String {
    if recent_context.is_empty() {
        return message.to_string();
    }
    let history = render_history(recent_context);
    format!(
        "Conversación reciente:\n{}\n\nMensaje a clasificar: {}",
        history, message
    )
}

/// Render turns as `role: content` lines.
pub fn render_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Two-stage router
// =============================================================================

/// Small-talk gate followed by a guides/products split.
///
/// Matching is a substring test on the lower-cased reply, so a chatty model
/// that mentions both labels is routed by whichever test runs first. That
/// is a known weak point; the JSON router does not have it.
pub struct TwoStageClassifier {
    generator: Arc<dyn TextGenerationProvider>,
}

const MATCHED: f64 = 1.0;
const DEFAULTED: f64 = 0.5;

impl TwoStageClassifier {
    pub fn new(generator: Arc<dyn TextGenerationProvider>) -> Self {
        Self { generator }
    }

    async fn ask(&self, instructions: &str, message: &str) -> Result<String, ChatError> {
        let turn = Message::user(format!("Mensaje: {}", message));
        let reply = self
            .generator
            .generate(instructions, std::slice::from_ref(&turn))
            .await?;
        Ok(reply)
    }

    async fn try_classify(&self, message: &str) -> Result<Intent, ChatError> {
        let stage_one = self.ask(prompts::SMALL_TALK_GATE, message).await?;
        let first = stage_one.to_lowercase();
        let mut metadata = IntentMetadata::default();
        metadata
            .extra
            .insert("stage_one".to_string(), Value::String(stage_one.clone()));

        if first.contains("small_talk") {
            debug!(reply = %stage_one, "Two-stage router: small talk");
            return Ok(Intent::new(IntentType::Chat, MATCHED).with_metadata(metadata));
        }
        let first_confidence = if first.contains("consulta") {
            MATCHED
        } else {
            DEFAULTED
        };

        let stage_two = self.ask(prompts::COLLECTION_GATE, message).await?;
        let second = stage_two.to_lowercase();
        metadata
            .extra
            .insert("stage_two".to_string(), Value::String(stage_two.clone()));

        let (kind, second_confidence) = if second.contains("guias") || second.contains("guías") {
            (IntentType::Retrieval, MATCHED)
        } else if second.contains("productos") {
            (IntentType::Structured, MATCHED)
        } else {
            (IntentType::Structured, DEFAULTED)
        };
        debug!(stage_one = %stage_one, stage_two = %stage_two, intent = %kind, "Two-stage router");

        Ok(Intent::new(kind, first_confidence.min(second_confidence)).with_metadata(metadata))
    }
}

#[async_trait]
impl IntentClassifier for TwoStageClassifier {
    async fn classify(&self, message: &str, _recent_context: &[Message]) -> Intent {
        match self.try_classify(message).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!(error = %e, "Two-stage classification failed, treating as UNKNOWN");
                Intent::unknown()
            }
        }
    }
}
