//! OpenAI provider implementation
//!
//! This module implements the VisionProvider trait for OpenAI's GPT models.
//! See: https://platform.openai.com/docs/api-reference/chat
//!
//! # Examples
//!
//! ## Custom configuration
//!
//! ```no_run
//! use scalp_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OpenAIConfig::new("sk-...")
//!     .with_model("gpt-4o")
//!     .with_max_tokens(1500);
//!
//! let provider = OpenAIProvider::with_config(config)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Using with OpenAI-compatible APIs
//!
//! Any endpoint that speaks the chat-completions protocol with image parts
//! works through `with_api_base`, e.g. a local vision model server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::providers::{DEFAULT_MAX_TOKENS, ensure_api_key};
use crate::transport::DEFAULT_TIMEOUT_SECS;
use crate::{
    EncodedImage, HttpRequest, HttpTransport, LLMError, Provider, Result, Transport,
    VisionProvider, VisionRequest,
};

/// Default API base
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
/// Default vision model
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// Configuration for OpenAI provider
#[derive(Clone)]
pub struct OpenAIConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for the OpenAI API (default: "https://api.openai.com/v1")
    /// Can be customized for OpenAI-compatible APIs.
    pub api_base: String,

    /// Model identifier
    pub model: String,

    /// Cap on generated tokens
    pub max_tokens: usize,
}

impl OpenAIConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Create config from environment variable
    ///
    /// Reads the API key from `OPENAI_API_KEY` environment variable.
    /// Optionally reads base URL from `OPENAI_API_BASE` if set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(Provider::OpenAI.api_key_env()).map_err(|_| {
            LLMError::ConfigurationError("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let api_base = std::env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| DEFAULT_OPENAI_API_BASE.to_string());

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

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

/// OpenAI provider
///
/// Sends the system prompt as a `system` message and the chart as an
/// `image_url` part carrying a `data:` URL.
pub struct OpenAIProvider {
    transport: Arc<dyn Transport>,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a provider with its own HTTP transport
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a provider over an existing transport
    ///
    /// Fails with a configuration error when the API key is blank; nothing is
    /// sent in that case.
    pub fn with_transport(config: OpenAIConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        ensure_api_key(Provider::OpenAI, &config.api_key)?;
        Ok(Self { transport, config })
    }

    /// Create a new OpenAI provider with API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    /// Create a provider from environment variable
    pub fn from_env() -> Result<Self> {
        Self::with_config(OpenAIConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn build_request(&self, request: &VisionRequest) -> Result<HttpRequest> {
        let body = OpenAIRequest {
            model: self.config.model.clone(),
            messages: build_openai_messages(request),
            max_tokens: self.config.max_tokens,
        };

        Ok(HttpRequest::post(
            format!("{}/chat/completions", self.config.api_base),
            serde_json::to_value(&body)?,
        )
        .header("Authorization", format!("Bearer {}", self.config.api_key))
        .header("Content-Type", "application/json"))
    }
}

#[async_trait]
impl VisionProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(model = %self.config.model, api_base = %self.config.api_base))]
    async fn analyze(&self, request: VisionRequest) -> Result<String> {
        debug!("Sending request to OpenAI API at {}", self.config.api_base);

        let http_request = self.build_request(&request)?;
        let raw = self
            .transport
            .send(http_request)
            .await
            .map_err(|e| super::with_model(e, &self.config.model))?;

        let response: OpenAIResponse = serde_json::from_value(raw).map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        // Extract first choice (OpenAI can return multiple but we use first)
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

        if let Some(usage) = &response.usage {
            debug!(
                "Received response - finish_reason: {:?}, tokens: {}/{}",
                choice.finish_reason, usage.prompt_tokens, usage.completion_tokens
            );
        }
        if choice.finish_reason.as_deref() == Some("length") {
            debug!("Completion truncated at {} tokens", self.config.max_tokens);
        }

        choice.message.content.ok_or_else(|| {
            LLMError::UnexpectedResponse("Choice has no text content".to_string())
        })
    }

    fn provider(&self) -> Provider {
        Provider::OpenAI
    }
}

// ============================================================================
// OpenAI-specific request types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: usize,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: OpenAIContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

// ============================================================================
// OpenAI-specific response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

// ============================================================================
// Conversion functions
// ============================================================================

/// Build OpenAI messages
///
/// Key difference from Anthropic: the system prompt goes into the messages array
fn build_openai_messages(request: &VisionRequest) -> Vec<OpenAIMessage> {
    vec![
        OpenAIMessage {
            role: "system",
            content: OpenAIContent::Text(request.system_prompt.clone()),
        },
        OpenAIMessage {
            role: "user",
            content: OpenAIContent::Parts(vec![
                ContentPart::Text {
                    text: user_text(&request.context),
                },
                image_part(&request.image),
            ]),
        },
    ]
}

fn user_text(context: &str) -> String {
    format!(
        "Here is a trading chart. Context provided by user: {context}. Analyze it thoroughly."
    )
}

fn image_part(image: &EncodedImage) -> ContentPart {
    ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: image.data_url(),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpMethod;
    use crate::transport::MockTransport;
    use serde_json::json;

    fn request() -> VisionRequest {
        VisionRequest::new(
            "You are a scalper",
            "Timeframe: 5m",
            EncodedImage::png("abc123"),
        )
    }

    fn completion(text: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": text},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 812, "completion_tokens": 230, "total_tokens": 1042}
        })
    }

    #[test]
    fn test_provider_creation() {
        let provider = OpenAIProvider::new("test-key");
        assert!(provider.is_ok());
        let provider = provider.unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.config().api_key, "test-key");
        assert_eq!(provider.config().api_base, "https://api.openai.com/v1");
        assert_eq!(provider.config().model, "gpt-4o");
        assert_eq!(provider.config().max_tokens, 1000);
    }

    #[test]
    fn test_blank_key_rejected() {
        let result = OpenAIProvider::new("   ");
        assert!(matches!(result, Err(LLMError::ConfigurationError(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = OpenAIConfig::new("test-key")
            .with_api_base("http://localhost:8000/v1/")
            .with_model("gpt-4.1")
            .with_max_tokens(2000);

        assert_eq!(config.api_base, "http://localhost:8000/v1");
        assert_eq!(config.model, "gpt-4.1");
        assert_eq!(config.max_tokens, 2000);
        assert!(!format!("{config:?}").contains("test-key"));
    }

    #[test]
    fn test_from_env_without_key() {
        // SAFETY: This is a test that modifies env vars, which is safe in single-threaded test context
        unsafe {
            std::env::remove_var("OPENAI_API_KEY");
        }
        let result = OpenAIProvider::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn test_message_layout() {
        let messages = build_openai_messages(&request());
        let value = serde_json::to_value(&messages).unwrap();

        assert_eq!(value[0]["role"], "system");
        assert_eq!(value[0]["content"], "You are a scalper");
        assert_eq!(value[1]["role"], "user");
        assert_eq!(value[1]["content"][0]["type"], "text");
        assert_eq!(
            value[1]["content"][0]["text"],
            "Here is a trading chart. Context provided by user: Timeframe: 5m. Analyze it thoroughly."
        );
        assert_eq!(value[1]["content"][1]["type"], "image_url");
        assert_eq!(
            value[1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,abc123"
        );
    }

    #[tokio::test]
    async fn test_analyze_returns_text_unmodified() {
        let text = "## 🚨 TRADE SIGNAL: LONG\n\n*   **Entry**: 1.0850";
        let expected = text.to_string();

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.url == "https://api.openai.com/v1/chat/completions"
                    && req.header_value("Authorization") == Some("Bearer test-key")
                    && req.body.as_ref().is_some_and(|b| {
                        b["model"] == "gpt-4o" && b["max_tokens"] == 1000
                    })
            })
            .times(1)
            .returning(move |_| Ok(completion(text)));

        let provider =
            OpenAIProvider::with_transport(OpenAIConfig::new("test-key"), Arc::new(transport))
                .unwrap();

        let result = provider.analyze(request()).await.unwrap();
        assert_eq!(result, expected);
    }

    #[tokio::test]
    async fn test_missing_choices_is_unexpected_response() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| Ok(json!({"choices": []})));

        let provider =
            OpenAIProvider::with_transport(OpenAIConfig::new("k"), Arc::new(transport)).unwrap();

        let err = provider.analyze(request()).await.unwrap_err();
        assert!(matches!(err, LLMError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn test_null_content_is_unexpected_response() {
        let mut transport = MockTransport::new();
        transport.expect_send().returning(|_| {
            Ok(json!({"choices": [{"message": {"role": "assistant", "content": null}}]}))
        });

        let provider =
            OpenAIProvider::with_transport(OpenAIConfig::new("k"), Arc::new(transport)).unwrap();

        let err = provider.analyze(request()).await.unwrap_err();
        assert!(matches!(err, LLMError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn test_model_not_found_names_model() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| {
                Err(LLMError::from_status(
                    404,
                    r#"{"error": {"message": "The model does not exist"}}"#,
                ))
            });

        let provider = OpenAIProvider::with_transport(
            OpenAIConfig::new("k").with_model("gpt-retired"),
            Arc::new(transport),
        )
        .unwrap();

        let err = provider.analyze(request()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Model not found: gpt-retired: The model does not exist"
        );
    }
}
