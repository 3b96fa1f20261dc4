//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use brocha_chat::DialogueOrchestrator;
use brocha_core::config::BrochaConfig;

/// Shared application state, cloned into every handler task.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BrochaConfig>,
    /// Dialogue entry point; owns the conversation memory.
    pub orchestrator: Arc<DialogueOrchestrator>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: BrochaConfig, orchestrator: Arc<DialogueOrchestrator>) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            start_time: Instant::now(),
        }
    }
}
