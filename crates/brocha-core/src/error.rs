use thiserror::Error;

/// Top-level error type for the Brocha system.
///
/// Subsystem crates either use this directly or define their own error types
/// and convert at the boundary, so the `?` operator works across crates.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BrochaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for BrochaError {
    fn from(err: toml::de::Error) -> Self {
        BrochaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BrochaError {
    fn from(err: toml::ser::Error) -> Self {
        BrochaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for BrochaError {
    fn from(err: serde_json::Error) -> Self {
        BrochaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Brocha operations.
pub type Result<T> = std::result::Result<T, BrochaError>;
