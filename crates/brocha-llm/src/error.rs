use thiserror::Error;

use brocha_core::error::BrochaError;

/// Failure talking to a generation or embedding backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode provider response: {0}")]
    Decode(String),

    #[error("provider returned no content")]
    Empty,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ProviderError {
    /// Short machine-readable label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::Http(_) => "http",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Status { .. } => "status",
            ProviderError::Decode(_) => "decode",
            ProviderError::Empty => "empty",
            ProviderError::InvalidInput(_) => "invalid_input",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Http(err.to_string())
        }
    }
}

impl From<ProviderError> for BrochaError {
    fn from(err: ProviderError) -> Self {
        BrochaError::Provider(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = ProviderError::Status {
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "provider returned status 429: rate limited");
        assert_eq!(err.kind(), "status");
    }

    #[test]
    fn test_into_brocha_error() {
        let err: BrochaError = ProviderError::Empty.into();
        assert!(matches!(err, BrochaError::Provider(_)));
        assert_eq!(err.to_string(), "Provider error: provider returned no content");
    }
}
