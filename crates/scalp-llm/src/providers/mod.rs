//! Concrete vendor adapters
//!
//! This module contains implementations of the VisionProvider trait for
//! OpenAI, Anthropic and Google Gemini.

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use gemini::{GeminiConfig, GeminiProvider};
pub use openai::{OpenAIConfig, OpenAIProvider};

use crate::{LLMError, Provider, Result};

/// Default cap on generated tokens for vendors that require one
pub const DEFAULT_MAX_TOKENS: usize = 1000;

/// Reject blank keys before any request is built
pub(crate) fn ensure_api_key(provider: Provider, api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(LLMError::ConfigurationError(format!(
            "{provider} API key is required"
        )));
    }
    Ok(())
}

/// The transport only sees URLs; put the model name in front of the vendor's 404 message
pub(crate) fn with_model(err: LLMError, model: &str) -> LLMError {
    match err {
        LLMError::ModelNotFound(detail) if detail.trim().is_empty() => {
            LLMError::ModelNotFound(model.to_string())
        }
        LLMError::ModelNotFound(detail) => LLMError::ModelNotFound(format!("{model}: {detail}")),
        other => other,
    }
}
