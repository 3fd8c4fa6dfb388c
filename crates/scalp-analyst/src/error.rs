//! Error types for chart analysis operations

use scalp_llm::{LLMError, Provider};
use thiserror::Error;

use crate::codec::CodecError;

/// Chart analysis errors
#[derive(Debug, Error)]
pub enum AnalystError {
    /// The chart could not be serialized
    #[error("Image encoding failed: {0}")]
    Encoding(#[from] CodecError),

    /// The vendor call failed (network, auth, quota, malformed response)
    #[error("{provider} request failed: {source}")]
    Provider {
        provider: Provider,
        #[source]
        source: LLMError,
    },

    /// Missing API key or unusable settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller-supplied values out of range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Prompt template failed to render
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Lessons file could not be read or written
    #[error("Knowledge base error: {0}")]
    Knowledge(#[from] std::io::Error),
}

impl AnalystError {
    /// Attribute an adapter error to its vendor
    ///
    /// Configuration failures stay configuration failures so a blank key is
    /// reported the same way whichever layer caught it.
    pub fn from_provider(provider: Provider, err: LLMError) -> Self {
        match err {
            LLMError::ConfigurationError(message) => Self::Configuration(message),
            source => Self::Provider { provider, source },
        }
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalystError>;
