//! Provider selection and the adapter trait

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{LLMError, Result, VisionRequest};

/// Hosted vendor that performs the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI chat completions
    #[default]
    OpenAI,
    /// Anthropic messages
    Anthropic,
    /// Google Gemini generateContent
    Gemini,
}

impl Provider {
    /// All providers, in menu order
    pub const ALL: [Self; 3] = [Self::OpenAI, Self::Anthropic, Self::Gemini];

    /// Short machine identifier
    pub fn id(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Environment variable that conventionally holds this vendor's key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GOOGLE_API_KEY",
        }
    }

    /// Where a user obtains a key
    pub fn key_url(&self) -> &'static str {
        match self {
            Self::OpenAI => "https://platform.openai.com/api-keys",
            Self::Anthropic => "https://console.anthropic.com/",
            Self::Gemini => "https://aistudio.google.com/app/apikey",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Gemini => "Google Gemini",
        };
        f.write_str(name)
    }
}

impl FromStr for Provider {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "gpt" => Ok(Self::OpenAI),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" | "google gemini" => Ok(Self::Gemini),
            other => Err(LLMError::ConfigurationError(format!(
                "unknown provider '{other}' (expected openai, anthropic or gemini)"
            ))),
        }
    }
}

/// Trait for multimodal chart-analysis adapters
///
/// Implementations own their API key and vendor settings; a call sends one
/// image plus text and returns the primary text completion unmodified.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Run one analysis
    ///
    /// # Arguments
    ///
    /// * `request` - System prompt, caller context and encoded image
    ///
    /// # Returns
    ///
    /// The generated markdown text
    async fn analyze(&self, request: VisionRequest) -> Result<String>;

    /// Which vendor this adapter talks to
    fn provider(&self) -> Provider;

    /// Get the provider name (e.g., "anthropic", "openai")
    fn name(&self) -> &str {
        self.provider().id()
    }
}
