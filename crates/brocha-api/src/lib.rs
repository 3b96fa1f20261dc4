//! Brocha API crate - axum HTTP server for the WhatsApp gateway.
//!
//! Exposes the webhook that feeds customer messages to the dialogue
//! orchestrator, a read-only view of stored conversations, and a health
//! check.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
