//! Dialogue layer for Brocha.
//!
//! Routes each customer message to small talk, a knowledge-base answer or a
//! catalog lookup, and keeps a short per-user history in memory.

pub mod classifier;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod prompts;
pub mod retrieval;
pub mod structured;

pub use classifier::{
    build_classifier, parse_intent, IntentClassifier, JsonIntentClassifier, TwoStageClassifier,
};
pub use error::ChatError;
pub use memory::ConversationMemory;
pub use orchestrator::{DialogueOrchestrator, DialogueOutcome, Route};
pub use retrieval::RetrievalAnswerer;
pub use structured::StructuredAnswerer;
