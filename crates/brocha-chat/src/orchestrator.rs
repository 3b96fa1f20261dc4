//! Dialogue orchestrator: classifies each inbound message, dispatches it to
//! the matching answerer and records both sides in conversation memory.
//!
//! Callers always get text back. Faults inside a run are logged and turned
//! into a fixed apology.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use brocha_core::config::BrochaConfig;
use brocha_core::types::{Intent, IntentType, Message};
use brocha_llm::{EmbeddingProvider, TextGenerationProvider};
use brocha_storage::RelationalStore;
use brocha_vector::KnowledgeIndex;

use crate::classifier::{build_classifier, render_history, IntentClassifier};
use crate::error::ChatError;
use crate::memory::ConversationMemory;
use crate::prompts;
use crate::retrieval::RetrievalAnswerer;
use crate::structured::StructuredAnswerer;

/// Branch taken for a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    DirectReply,
    Retrieval,
    Structured,
    Clarify,
}

impl Route {
    pub fn for_intent(kind: IntentType) -> Self {
        match kind {
            IntentType::Chat => Route::DirectReply,
            IntentType::Retrieval => Route::Retrieval,
            IntentType::Structured => Route::Structured,
            IntentType::Unknown => Route::Clarify,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::DirectReply => "direct_reply",
            Route::Retrieval => "retrieval",
            Route::Structured => "structured",
            Route::Clarify => "clarify",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one dialogue run produced.
#[derive(Clone, Debug, Serialize)]
pub struct DialogueOutcome {
    pub reply: String,
    pub intent: Intent,
    pub route: Route,
    /// The fault behind an apology reply, if any.
    pub error: Option<String>,
}

pub struct DialogueOrchestrator {
    memory: Arc<ConversationMemory>,
    classifier: Arc<dyn IntentClassifier>,
    generator: Arc<dyn TextGenerationProvider>,
    retrieval: RetrievalAnswerer,
    structured: StructuredAnswerer,
    context_window: usize,
    max_message_chars: usize,
}

impl DialogueOrchestrator {
    pub fn new(
        memory: Arc<ConversationMemory>,
        classifier: Arc<dyn IntentClassifier>,
        generator: Arc<dyn TextGenerationProvider>,
        retrieval: RetrievalAnswerer,
        structured: StructuredAnswerer,
    ) -> Self {
        Self {
            memory,
            classifier,
            generator,
            retrieval,
            structured,
            context_window: 10,
            max_message_chars: 2000,
        }
    }

    /// Wire every stage from configuration.
    pub fn from_config(
        config: &BrochaConfig,
        memory: Arc<ConversationMemory>,
        generator: Arc<dyn TextGenerationProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn KnowledgeIndex>,
        store: Arc<dyn RelationalStore>,
    ) -> Self {
        let classifier = build_classifier(config.chat.classifier, Arc::clone(&generator));
        let retrieval =
            RetrievalAnswerer::new(embedder, index, Arc::clone(&generator), &config.retrieval);
        let structured = StructuredAnswerer::new(store, &config.catalog);

        Self::new(memory, classifier, generator, retrieval, structured)
            .with_context_window(config.chat.context_window)
            .with_max_message_chars(config.chat.max_message_chars)
    }

    pub fn with_context_window(mut self, messages: usize) -> Self {
        self.context_window = messages.max(1);
        self
    }

    pub fn with_max_message_chars(mut self, chars: usize) -> Self {
        self.max_message_chars = chars.max(1);
        self
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    /// Handle one inbound message and return the reply text.
    pub async fn handle_message(&self, user_id: &str, message: &str) -> String {
        self.handle_message_detailed(user_id, message).await.reply
    }

    /// Like [`handle_message`](Self::handle_message), also reporting the
    /// intent and route taken.
    pub async fn handle_message_detailed(&self, user_id: &str, message: &str) -> DialogueOutcome {
        // Reject blank input before touching memory or providers
        if message.trim().is_empty() {
            return DialogueOutcome {
                reply: prompts::CLARIFICATION.to_string(),
                intent: Intent::unknown(),
                route: Route::Clarify,
                error: None,
            };
        }
        let message = truncate_chars(message, self.max_message_chars);

        let outcome = match self.run(user_id, message).await {
            Ok((reply, intent)) => DialogueOutcome {
                route: Route::for_intent(intent.kind),
                reply,
                intent,
                error: None,
            },
            Err((e, intent)) => {
                error!(user_id = %user_id, message = %message, error = %e, "Dialogue run failed");
                DialogueOutcome {
                    reply: prompts::APOLOGY.to_string(),
                    route: Route::for_intent(intent.kind),
                    intent,
                    error: Some(e.to_string()),
                }
            }
        };

        if let Err(e) = self
            .memory
            .add_message(user_id, Message::assistant(outcome.reply.clone()))
        {
            error!(user_id = %user_id, error = %e, "Failed to store assistant reply");
        }

        info!(
            user_id = %user_id,
            intent = %outcome.intent.kind,
            confidence = outcome.intent.confidence,
            route = %outcome.route,
            failed = outcome.error.is_some(),
            "Dialogue run finished"
        );
        outcome
    }

    /// The stored conversation for `user_id`, oldest first.
    pub fn history(&self, user_id: &str) -> Result<Vec<Message>, ChatError> {
        self.memory.get_messages(user_id)
    }

    async fn run(&self, user_id: &str, message: &str) -> Result<(String, Intent), (ChatError, Intent)> {
        self.memory
            .add_message(user_id, Message::user(message))
            .map_err(|e| (e, Intent::unknown()))?;

        let stored = self
            .memory
            .get_messages(user_id)
            .map_err(|e| (e, Intent::unknown()))?;
        let start = stored.len().saturating_sub(self.context_window);
        let context = &stored[start..];
        // Everything before the message being handled
        let prior = &context[..context.len().saturating_sub(1)];

        let intent = self.classifier.classify(message, prior).await;
        let reply = match intent.kind {
            IntentType::Chat => self
                .generator
                .generate(prompts::FRIENDLY_PERSONA, context)
                .await
                .map_err(ChatError::from),
            IntentType::Retrieval => self.retrieval.answer(message, &render_history(prior)).await,
            IntentType::Structured => Ok(self.structured.answer(message).await),
            IntentType::Unknown => Ok(prompts::CLARIFICATION.to_string()),
        };

        match reply {
            Ok(reply) => Ok((reply, intent)),
            Err(e) => Err((e, intent)),
        }
    }
}

/// The first `max_chars` characters of `text`.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
