//! Google Gemini provider implementation
//!
//! Supports Gemini models via the Google AI `generateContent` API.
//! See: https://ai.google.dev/api/generate-content
//!
//! Unlike the other adapters this one degrades: see [`crate::fallback`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::providers::ensure_api_key;
use crate::transport::DEFAULT_TIMEOUT_SECS;
use crate::{
    FallbackChain, FallbackStage, HttpRequest, HttpTransport, LLMError, ModelBackend, Provider,
    Result, Transport, VisionProvider, VisionRequest,
};

/// Default API base
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Most capable model, tried first
pub const DEFAULT_GEMINI_PRIMARY_MODEL: &str = "gemini-3-pro-preview";
/// Faster model, tried when the primary fails
pub const DEFAULT_GEMINI_SECONDARY_MODEL: &str = "gemini-3-flash-preview";

const LIST_PAGE_SIZE: u32 = 1000;
// Guards against a misbehaving server that keeps returning a page token.
const MAX_LIST_PAGES: usize = 20;

/// Configuration for Gemini provider
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key
    pub api_key: String,
    /// Base URL (default: "https://generativelanguage.googleapis.com/v1beta")
    pub api_base: String,
    /// Model tried first
    pub primary_model: String,
    /// Model tried when the primary fails
    pub secondary_model: String,
    /// Optional cap on generated tokens; unset leaves the model default
    pub max_output_tokens: Option<usize>,
}

impl GeminiConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            primary_model: DEFAULT_GEMINI_PRIMARY_MODEL.to_string(),
            secondary_model: DEFAULT_GEMINI_SECONDARY_MODEL.to_string(),
            max_output_tokens: None,
        }
    }

    /// Create config from environment variable
    ///
    /// Reads the API key from `GOOGLE_API_KEY`, and the base URL from
    /// `GEMINI_API_BASE` if set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(Provider::Gemini.api_key_env()).map_err(|_| {
            LLMError::ConfigurationError("GOOGLE_API_KEY environment variable not set".to_string())
        })?;
        let api_base = std::env::var("GEMINI_API_BASE")
            .unwrap_or_else(|_| DEFAULT_GEMINI_API_BASE.to_string());
        Ok(Self::new(api_key).with_api_base(api_base))
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set both model names
    pub fn with_models(
        mut self,
        primary: impl Into<String>,
        secondary: impl Into<String>,
    ) -> Self {
        self.primary_model = primary.into();
        self.secondary_model = secondary.into();
        self
    }

    /// Cap generated tokens
    pub fn with_max_output_tokens(mut self, max_output_tokens: usize) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_base", &self.api_base)
            .field("primary_model", &self.primary_model)
            .field("secondary_model", &self.secondary_model)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish_non_exhaustive()
    }
}

/// Google Gemini provider with primary/secondary/diagnostic fallback
pub struct GeminiProvider {
    transport: Arc<dyn Transport>,
    config: GeminiConfig,
    chain: FallbackChain,
}

impl GeminiProvider {
    /// Create a new Gemini provider instance
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(GeminiConfig::new(api_key))
    }

    /// Create a provider with its own HTTP transport
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a provider over an existing transport
    pub fn with_transport(config: GeminiConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        ensure_api_key(Provider::Gemini, &config.api_key)?;
        let chain = FallbackChain::new(&config.primary_model, &config.secondary_model);
        Ok(Self {
            transport,
            config,
            chain,
        })
    }

    /// Create a provider from environment variable
    pub fn from_env() -> Result<Self> {
        Self::with_config(GeminiConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn build_generate_request(&self, model: &str, request: &VisionRequest) -> Result<HttpRequest> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text {
                        text: format!(
                            "{}\n\nUser Context: {}",
                            request.system_prompt, request.context
                        ),
                    },
                    Part::InlineData {
                        inline_data: Blob {
                            mime_type: request.image.media_type.clone(),
                            data: request.image.data.clone(),
                        },
                    },
                ],
            }],
            generation_config: self
                .config
                .max_output_tokens
                .map(|max_output_tokens| GenerationConfig { max_output_tokens }),
        };

        let model_path = model_resource(model);
        Ok(HttpRequest::post(
            format!("{}/{model_path}:generateContent", self.config.api_base),
            serde_json::to_value(&body)?,
        )
        .header("x-goog-api-key", self.config.api_key.clone())
        .header("Content-Type", "application/json"))
    }

    fn build_list_request(&self, page_token: Option<&str>) -> HttpRequest {
        let mut request = HttpRequest::get(format!("{}/models", self.config.api_base))
            .query("pageSize", LIST_PAGE_SIZE.to_string());
        if let Some(token) = page_token {
            request = request.query("pageToken", token);
        }
        request.header("x-goog-api-key", self.config.api_key.clone())
    }
}

#[async_trait]
impl ModelBackend for GeminiProvider {
    #[instrument(skip(self, request))]
    async fn generate(&self, model: &str, request: &VisionRequest) -> Result<String> {
        debug!("Sending generateContent request to Gemini");

        let http_request = self.build_generate_request(model, request)?;
        let raw = self
            .transport
            .send(http_request)
            .await
            .map_err(|e| super::with_model(e, model))?;

        let response: GenerateContentResponse = serde_json::from_value(raw).map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        extract_text(response)
    }

    #[instrument(skip(self))]
    async fn list_models(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let raw = self
                .transport
                .send(self.build_list_request(page_token.as_deref()))
                .await?;
            let page: ListModelsResponse = serde_json::from_value(raw).map_err(|e| {
                LLMError::UnexpectedResponse(format!("Failed to parse model list: {e}"))
            })?;

            names.extend(page.models.into_iter().map(|m| m.name));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} Gemini models", names.len());
        Ok(names)
    }
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    #[instrument(skip(self, request), fields(primary = %self.chain.primary_model()))]
    async fn analyze(&self, request: VisionRequest) -> Result<String> {
        let outcome = self.chain.run(self, &request).await?;

        match outcome.stage() {
            FallbackStage::Primary => {}
            FallbackStage::Secondary => {
                info!("Gemini analysis served by {}", self.chain.secondary_model());
            }
            FallbackStage::Diagnostic => info!("Gemini models unavailable, returning listing"),
        }

        Ok(outcome.into_text())
    }

    fn provider(&self) -> Provider {
        Provider::Gemini
    }
}

/// Accept both `gemini-x` and `models/gemini-x`
fn model_resource(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

/// Concatenate the text parts of the first candidate
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(LLMError::UnexpectedResponse(format!(
            "Prompt blocked by Gemini: {reason}"
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::UnexpectedResponse("No candidates in response".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(LLMError::UnexpectedResponse(format!(
            "Candidate has no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

// ============================================================================
// Gemini-specific request/response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use crate::{EncodedImage, HttpMethod};
    use serde_json::json;

    fn request() -> VisionRequest {
        VisionRequest::new("SYSTEM", "Timeframe: 15m", EncodedImage::png("R0lGOD=="))
    }

    fn generated(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 900, "candidatesTokenCount": 300}
        })
    }

    fn provider(transport: MockTransport) -> GeminiProvider {
        GeminiProvider::with_transport(
            GeminiConfig::new("g-key").with_models("pro", "flash"),
            Arc::new(transport),
        )
        .unwrap()
    }

    fn is_generate(req: &HttpRequest, model: &str) -> bool {
        req.method == HttpMethod::Post
            && req.url.ends_with(&format!("/models/{model}:generateContent"))
    }

    #[test]
    fn test_provider_creation() {
        let provider = GeminiProvider::new("key").unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.config().primary_model, "gemini-3-pro-preview");
        assert_eq!(provider.config().secondary_model, "gemini-3-flash-preview");
        assert_eq!(provider.config().max_output_tokens, None);
    }

    #[test]
    fn test_blank_key_rejected() {
        assert!(matches!(
            GeminiProvider::new(""),
            Err(LLMError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_generate_request_shape() {
        let provider = provider(MockTransport::new());
        let http = provider.build_generate_request("pro", &request()).unwrap();

        assert_eq!(
            http.url,
            "https://generativelanguage.googleapis.com/v1beta/models/pro:generateContent"
        );
        assert_eq!(http.header_value("x-goog-api-key"), Some("g-key"));
        assert!(!http.url.contains("g-key"));

        let body = http.body.unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(parts[0]["text"], "SYSTEM\n\nUser Context: Timeframe: 15m");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "R0lGOD==");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_generation_config_when_capped() {
        let provider = GeminiProvider::with_transport(
            GeminiConfig::new("k").with_max_output_tokens(2048),
            Arc::new(MockTransport::new()),
        )
        .unwrap();
        let http = provider
            .build_generate_request("models/gemini-2.5-pro", &request())
            .unwrap();

        assert!(http.url.ends_with("/models/gemini-2.5-pro:generateContent"));
        assert_eq!(http.body.unwrap()["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[tokio::test]
    async fn test_analyze_returns_primary_text_unmodified() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| is_generate(req, "pro"))
            .times(1)
            .returning(|_| Ok(generated("## 🚨 TRADE SIGNAL: SHORT")));

        let text = provider(transport).analyze(request()).await.unwrap();
        assert_eq!(text, "## 🚨 TRADE SIGNAL: SHORT");
    }

    #[tokio::test]
    async fn test_multi_part_candidate_is_concatenated() {
        let mut transport = MockTransport::new();
        transport.expect_send().returning(|_| {
            Ok(json!({
                "candidates": [{"content": {"parts": [{"text": "## Signal"}, {"text": "\nLONG"}]}}]
            }))
        });

        let text = provider(transport).analyze(request()).await.unwrap();
        assert_eq!(text, "## Signal\nLONG");
    }

    #[tokio::test]
    async fn test_falls_back_to_secondary_model() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| is_generate(req, "pro"))
            .times(1)
            .returning(|_| Err(LLMError::from_status(404, "not found")));
        transport
            .expect_send()
            .withf(|req| is_generate(req, "flash"))
            .times(1)
            .returning(|_| Ok(generated("flash analysis")));

        let text = provider(transport).analyze(request()).await.unwrap();
        assert_eq!(text, "flash analysis");
    }

    #[tokio::test]
    async fn test_diagnostic_listing_after_double_failure() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| is_generate(req, "pro"))
            .returning(|_| Err(LLMError::from_status(404, "not found")));
        transport
            .expect_send()
            .withf(|req| is_generate(req, "flash"))
            .returning(|_| Err(LLMError::from_status(404, "not found")));
        transport
            .expect_send()
            .withf(|req| {
                req.method == HttpMethod::Get
                    && req.url.ends_with("/models")
                    && req.query_value("pageSize") == Some("1000")
            })
            .times(1)
            .returning(|_| {
                Ok(json!({"models": [
                    {"name": "models/gemini-2.5-pro"},
                    {"name": "models/gemini-2.5-flash"}
                ]}))
            });

        let text = provider(transport).analyze(request()).await.unwrap();
        assert!(text.starts_with("Error: Model not found: pro: not found"));
        assert!(text.contains("models/gemini-2.5-pro, models/gemini-2.5-flash"));
    }

    #[tokio::test]
    async fn test_list_models_follows_page_token() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| req.query_value("pageToken").is_none())
            .times(1)
            .returning(|_| {
                Ok(json!({"models": [{"name": "models/a"}], "nextPageToken": "Ab+c/d=="}))
            });
        transport
            .expect_send()
            .withf(|req| req.query_value("pageToken") == Some("Ab+c/d=="))
            .times(1)
            .returning(|_| Ok(json!({"models": [{"name": "models/b"}]})));

        let names = provider(transport).list_models().await.unwrap();
        assert_eq!(names, vec!["models/a".to_string(), "models/b".to_string()]);
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_unexpected_response() {
        let mut transport = MockTransport::new();
        transport.expect_send().returning(|_| {
            Ok(json!({"promptFeedback": {"blockReason": "SAFETY"}}))
        });

        let err = provider(transport)
            .generate("pro", &request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
