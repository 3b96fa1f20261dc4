pub mod config;
pub mod error;
pub mod types;

pub use config::{BrochaConfig, ClassifierStrategy};
pub use error::{BrochaError, Result};
pub use types::*;
