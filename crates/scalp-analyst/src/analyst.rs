//! Chart analysis entry point
//!
//! [`ChartAnalyst`] owns the configuration and one HTTP transport. Each call
//! validates the key, encodes the chart, picks the system prompt, builds the
//! vendor adapter and waits for its answer. Nothing is retried here; the
//! Gemini adapter degrades on its own.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use scalp_llm::providers::{
    AnthropicConfig, AnthropicProvider, GeminiConfig, GeminiProvider, OpenAIConfig, OpenAIProvider,
};
use scalp_llm::{HttpTransport, Provider, Transport, VisionProvider, VisionRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::codec::{ChartImage, encode_png_base64};
use crate::config::AnalystConfig;
use crate::error::{AnalystError, Result};
use crate::knowledge::KnowledgeBase;
use crate::prompts::{
    AnalysisContextBuilder, REVIEW_SYSTEM_PROMPT, render_review_context, truncate_chars,
};

/// One chart analysis call
#[derive(Clone)]
pub struct AnalysisRequest {
    pub provider: Provider,
    pub api_key: String,
    pub image: ChartImage,
    /// Free-text context, usually rendered from an `AnalysisContext`
    pub context: String,
}

impl AnalysisRequest {
    pub fn new(
        provider: Provider,
        api_key: impl Into<String>,
        image: ChartImage,
        context: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            image,
            context: context.into(),
        }
    }
}

impl fmt::Debug for AnalysisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRequest")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("image", &format_args!("{}x{}", self.image.width(), self.image.height()))
            .field("context", &self.context)
            .finish()
    }
}

/// How a closed trade ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeOutcome {
    Win,
    Loss,
}

impl TradeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Win => "WIN",
            Self::Loss => "LOSS",
        }
    }
}

impl fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeOutcome {
    type Err = AnalystError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" | "w" => Ok(Self::Win),
            "loss" | "l" => Ok(Self::Loss),
            other => Err(AnalystError::InvalidInput(format!(
                "unknown trade outcome '{other}' (expected win or loss)"
            ))),
        }
    }
}

/// One post-trade review call
#[derive(Clone)]
pub struct ReviewRequest {
    pub provider: Provider,
    pub api_key: String,
    /// Chart covering the trade from entry to exit
    pub image: ChartImage,
    pub outcome: TradeOutcome,
    /// What the trader thinks happened
    pub notes: String,
}

impl ReviewRequest {
    pub fn new(
        provider: Provider,
        api_key: impl Into<String>,
        image: ChartImage,
        outcome: TradeOutcome,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            image,
            outcome,
            notes: notes.into(),
        }
    }
}

impl fmt::Debug for ReviewRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewRequest")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("image", &format_args!("{}x{}", self.image.width(), self.image.height()))
            .field("outcome", &self.outcome)
            .field("notes", &self.notes)
            .finish()
    }
}

/// Chart analysis facade
pub struct ChartAnalyst {
    config: AnalystConfig,
    transport: Arc<dyn Transport>,
    knowledge: KnowledgeBase,
}

impl ChartAnalyst {
    /// Create an analyst backed by a real HTTP client
    pub fn new(config: AnalystConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.request_timeout)
            .map_err(|e| AnalystError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create an analyst over a custom transport
    pub fn with_transport(config: AnalystConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let knowledge = KnowledgeBase::new(config.knowledge_path.clone());
        Ok(Self {
            config,
            transport,
            knowledge,
        })
    }

    pub fn config(&self) -> &AnalystConfig {
        &self.config
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Build the adapter for a vendor from the current configuration
    pub fn vision_provider(
        &self,
        provider: Provider,
        api_key: &str,
    ) -> Result<Box<dyn VisionProvider>> {
        let transport = Arc::clone(&self.transport);
        let bases = &self.config.api_bases;
        let models = &self.config.models;

        let adapter: Box<dyn VisionProvider> = match provider {
            Provider::OpenAI => {
                let config = OpenAIConfig::new(api_key)
                    .with_api_base(&bases.openai)
                    .with_model(&models.openai)
                    .with_max_tokens(self.config.output_token_cap);
                Box::new(
                    OpenAIProvider::with_transport(config, transport)
                        .map_err(|e| AnalystError::from_provider(provider, e))?,
                )
            }
            Provider::Anthropic => {
                let config = AnthropicConfig::new(api_key)
                    .with_api_base(&bases.anthropic)
                    .with_model(&models.anthropic)
                    .with_max_tokens(self.config.output_token_cap);
                Box::new(
                    AnthropicProvider::with_transport(config, transport)
                        .map_err(|e| AnalystError::from_provider(provider, e))?,
                )
            }
            Provider::Gemini => {
                let mut config = GeminiConfig::new(api_key)
                    .with_api_base(&bases.gemini)
                    .with_models(&models.gemini_primary, &models.gemini_secondary);
                if let Some(cap) = self.config.gemini_output_token_cap {
                    config = config.with_max_output_tokens(cap);
                }
                Box::new(
                    GeminiProvider::with_transport(config, transport)
                        .map_err(|e| AnalystError::from_provider(provider, e))?,
                )
            }
        };
        Ok(adapter)
    }

    /// Analyze a chart with the configured mode
    ///
    /// Returns the model's markdown unchanged. The lessons file is not
    /// touched.
    #[instrument(skip(self, request), fields(provider = %request.provider, mode = %self.config.mode))]
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<String> {
        let context: &str = match self.config.context_char_limit {
            Some(limit) => truncate_chars(&request.context, limit),
            None => &request.context,
        };
        self.dispatch(
            request.provider,
            &request.api_key,
            &request.image,
            self.config.mode.system_prompt(),
            context,
        )
        .await
    }

    /// Render the trader's context, reading the lessons file unless the
    /// builder already carries knowledge text
    pub fn prepare_context(&self, context: AnalysisContextBuilder) -> Result<String> {
        let context = if context.has_knowledge() {
            context
        } else {
            context.knowledge(self.knowledge.load()?)
        };
        context.build().render(self.config.context_char_limit)
    }

    /// Load the lessons file, build the context and analyze
    pub async fn analyze_with_context(
        &self,
        provider: Provider,
        api_key: &str,
        image: ChartImage,
        context: AnalysisContextBuilder,
    ) -> Result<String> {
        ensure_api_key(provider, api_key)?;
        let context = self.prepare_context(context)?;
        self.analyze(AnalysisRequest::new(provider, api_key, image, context))
            .await
    }

    /// Critique a closed trade and suggest one new rule
    ///
    /// The suggested rule is not saved; call [`ChartAnalyst::record_lesson`]
    /// once the trader accepts it.
    #[instrument(skip(self, request), fields(provider = %request.provider, outcome = %request.outcome))]
    pub async fn review_outcome(&self, request: ReviewRequest) -> Result<String> {
        ensure_api_key(request.provider, &request.api_key)?;

        let knowledge = self.knowledge.load()?;
        let context = render_review_context(
            request.outcome.as_str(),
            &request.notes,
            &knowledge,
            self.config.context_char_limit,
        )?;

        self.dispatch(
            request.provider,
            &request.api_key,
            &request.image,
            REVIEW_SYSTEM_PROMPT,
            &context,
        )
        .await
    }

    /// Append a lesson to the knowledge base
    pub fn record_lesson(&self, lesson: &str) -> Result<()> {
        self.knowledge.append_lesson(lesson)?;
        Ok(())
    }

    async fn dispatch(
        &self,
        provider: Provider,
        api_key: &str,
        image: &ChartImage,
        system_prompt: &str,
        context: &str,
    ) -> Result<String> {
        ensure_api_key(provider, api_key)?;

        let encoded = encode_png_base64(image)?;
        let adapter = self.vision_provider(provider, api_key)?;
        debug!(
            adapter = adapter.name(),
            model = self.config.model_for(provider),
            context_chars = context.chars().count(),
            "Dispatching chart analysis"
        );

        let text = adapter
            .analyze(VisionRequest::new(system_prompt, context, encoded))
            .await
            .map_err(|e| AnalystError::from_provider(provider, e))?;

        info!(provider = %provider, chars = text.len(), "Analysis complete");
        Ok(text)
    }
}

fn ensure_api_key(provider: Provider, api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(AnalystError::Configuration(format!(
            "{provider} API key is required"
        )));
    }
    Ok(())
}
