//! Anthropic Claude provider implementation
//!
//! This module implements the VisionProvider trait for Anthropic's Claude models.
//! See: https://docs.anthropic.com/en/api/messages

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::providers::{DEFAULT_MAX_TOKENS, ensure_api_key};
use crate::transport::DEFAULT_TIMEOUT_SECS;
use crate::{
    HttpRequest, HttpTransport, LLMError, Provider, Result, Transport, VisionProvider,
    VisionRequest,
};

/// Default API base
pub const DEFAULT_ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
/// Default vision model
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20240620";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Configuration for Anthropic provider
#[derive(Clone)]
pub struct AnthropicConfig {
    /// API key
    pub api_key: String,
    /// Base URL (default: "https://api.anthropic.com/v1")
    pub api_base: String,
    /// Model identifier
    pub model: String,
    /// Cap on generated tokens (required by the messages API)
    pub max_tokens: usize,
}

impl AnthropicConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_ANTHROPIC_API_BASE.to_string(),
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Create config from environment variable
    ///
    /// Reads the API key from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(Provider::Anthropic.api_key_env()).map_err(|_| {
            LLMError::ConfigurationError(
                "ANTHROPIC_API_KEY environment variable not set".to_string(),
            )
        })?;
        let api_base = std::env::var("ANTHROPIC_API_BASE")
            .unwrap_or_else(|_| DEFAULT_ANTHROPIC_API_BASE.to_string());
        Ok(Self::new(api_key).with_api_base(api_base))
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the generated-token cap
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl std::fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

/// Anthropic Claude provider
pub struct AnthropicProvider {
    transport: Arc<dyn Transport>,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key
    ///
    /// # Returns
    ///
    /// A new Anthropic provider instance
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(AnthropicConfig::new(api_key))
    }

    /// Create a provider with its own HTTP transport
    pub fn with_config(config: AnthropicConfig) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a provider over an existing transport
    pub fn with_transport(config: AnthropicConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        ensure_api_key(Provider::Anthropic, &config.api_key)?;
        Ok(Self { transport, config })
    }

    /// Create a provider from environment variable
    pub fn from_env() -> Result<Self> {
        Self::with_config(AnthropicConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &AnthropicConfig {
        &self.config
    }

    fn build_request(&self, request: &VisionRequest) -> Result<HttpRequest> {
        let body = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: request.system_prompt.clone(),
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource::Base64 {
                            media_type: request.image.media_type.clone(),
                            data: request.image.data.clone(),
                        },
                    },
                    ContentBlock::Text {
                        text: format!("Context: {}. Analyze this chart.", request.context),
                    },
                ],
            }],
        };

        Ok(HttpRequest::post(
            format!("{}/messages", self.config.api_base),
            serde_json::to_value(&body)?,
        )
        .header("x-api-key", self.config.api_key.clone())
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("content-type", "application/json"))
    }
}

#[async_trait]
impl VisionProvider for AnthropicProvider {
    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn analyze(&self, request: VisionRequest) -> Result<String> {
        debug!("Sending request to Anthropic API");

        let http_request = self.build_request(&request)?;
        let raw = self
            .transport
            .send(http_request)
            .await
            .map_err(|e| super::with_model(e, &self.config.model))?;

        // Parse response
        let response: AnthropicResponse = serde_json::from_value(raw).map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        if let Some(usage) = &response.usage {
            debug!(
                "Received response - stop_reason: {:?}, tokens: {}/{}",
                response.stop_reason, usage.input_tokens, usage.output_tokens
            );
        }

        response
            .content
            .into_iter()
            .find_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .ok_or_else(|| {
                LLMError::UnexpectedResponse("No text block in response content".to_string())
            })
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }
}

// Anthropic-specific request/response types
// These match the Anthropic API format exactly

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: usize,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ImageSource {
    Base64 { media_type: String, data: String },
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<UsageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    input_tokens: usize,
    output_tokens: usize,
}
