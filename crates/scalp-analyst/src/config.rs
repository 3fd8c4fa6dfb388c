//! Configuration for chart analysis

use std::path::PathBuf;
use std::time::Duration;

use scalp_llm::Provider;
use scalp_llm::providers::anthropic::{DEFAULT_ANTHROPIC_API_BASE, DEFAULT_ANTHROPIC_MODEL};
use scalp_llm::providers::gemini::{
    DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_PRIMARY_MODEL, DEFAULT_GEMINI_SECONDARY_MODEL,
};
use scalp_llm::providers::openai::{DEFAULT_OPENAI_API_BASE, DEFAULT_OPENAI_MODEL};
use scalp_llm::providers::DEFAULT_MAX_TOKENS;
use scalp_utils::{env_opt, env_parse};
use serde::{Deserialize, Serialize};

use crate::error::{AnalystError, Result};
use crate::knowledge::DEFAULT_KNOWLEDGE_PATH;
use crate::prompts::AnalysisMode;

/// Model names per vendor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub openai: String,
    pub anthropic: String,
    /// Gemini model tried first
    pub gemini_primary: String,
    /// Gemini model tried when the primary fails
    pub gemini_secondary: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            openai: DEFAULT_OPENAI_MODEL.to_string(),
            anthropic: DEFAULT_ANTHROPIC_MODEL.to_string(),
            gemini_primary: DEFAULT_GEMINI_PRIMARY_MODEL.to_string(),
            gemini_secondary: DEFAULT_GEMINI_SECONDARY_MODEL.to_string(),
        }
    }
}

/// Vendor endpoints, overridable for proxies and compatible servers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiBases {
    pub openai: String,
    pub anthropic: String,
    pub gemini: String,
}

impl Default for ApiBases {
    fn default() -> Self {
        Self {
            openai: DEFAULT_OPENAI_API_BASE.to_string(),
            anthropic: DEFAULT_ANTHROPIC_API_BASE.to_string(),
            gemini: DEFAULT_GEMINI_API_BASE.to_string(),
        }
    }
}

/// Configuration for chart analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystConfig {
    /// Vendor used when the caller does not pick one
    pub provider: Provider,

    /// System prompt selection
    pub mode: AnalysisMode,

    /// Model names
    pub models: ModelSettings,

    /// Cap on generated tokens for OpenAI and Anthropic
    pub output_token_cap: usize,

    /// Optional cap for Gemini; unset leaves the model default
    pub gemini_output_token_cap: Option<usize>,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Lessons file
    pub knowledge_path: PathBuf,

    /// Maximum context length in chars; unset never truncates
    pub context_char_limit: Option<usize>,

    /// Vendor endpoints
    pub api_bases: ApiBases,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            mode: AnalysisMode::default(),
            models: ModelSettings::default(),
            output_token_cap: DEFAULT_MAX_TOKENS,
            gemini_output_token_cap: None,
            request_timeout: Duration::from_secs(120),
            knowledge_path: PathBuf::from(DEFAULT_KNOWLEDGE_PATH),
            context_char_limit: None,
            api_bases: ApiBases::default(),
        }
    }
}

impl AnalystConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalystConfigBuilder {
        AnalystConfigBuilder::default()
    }

    /// Apply `SCALP_*` and `*_API_BASE` environment overrides
    ///
    /// Unset, blank and unparsable variables leave the current value alone.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(model) = env_opt("SCALP_OPENAI_MODEL") {
            self.models.openai = model;
        }
        if let Some(model) = env_opt("SCALP_ANTHROPIC_MODEL") {
            self.models.anthropic = model;
        }
        if let Some(model) = env_opt("SCALP_GEMINI_PRIMARY_MODEL") {
            self.models.gemini_primary = model;
        }
        if let Some(model) = env_opt("SCALP_GEMINI_SECONDARY_MODEL") {
            self.models.gemini_secondary = model;
        }
        if let Some(cap) = env_parse("SCALP_OUTPUT_TOKEN_CAP") {
            self.output_token_cap = cap;
        }
        if let Some(secs) = env_parse("SCALP_TIMEOUT_SECS") {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = env_opt("SCALP_KNOWLEDGE_PATH") {
            self.knowledge_path = PathBuf::from(path);
        }
        if let Some(base) = env_opt("OPENAI_API_BASE") {
            self.api_bases.openai = base;
        }
        if let Some(base) = env_opt("ANTHROPIC_API_BASE") {
            self.api_bases.anthropic = base;
        }
        if let Some(base) = env_opt("GEMINI_API_BASE") {
            self.api_bases.gemini = base;
        }
        self
    }

    /// Model name used for a vendor; for Gemini this is the primary model
    pub fn model_for(&self, provider: Provider) -> &str {
        match provider {
            Provider::OpenAI => &self.models.openai,
            Provider::Anthropic => &self.models.anthropic,
            Provider::Gemini => &self.models.gemini_primary,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.output_token_cap == 0 || self.gemini_output_token_cap == Some(0) {
            return Err(AnalystError::Configuration(
                "output token cap must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(AnalystError::Configuration(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        if self.context_char_limit == Some(0) {
            return Err(AnalystError::Configuration(
                "context char limit must be greater than 0".to_string(),
            ));
        }

        let models = [
            ("openai", &self.models.openai),
            ("anthropic", &self.models.anthropic),
            ("gemini primary", &self.models.gemini_primary),
            ("gemini secondary", &self.models.gemini_secondary),
        ];
        for (label, model) in models {
            if model.trim().is_empty() {
                return Err(AnalystError::Configuration(format!(
                    "{label} model name is empty"
                )));
            }
        }

        let bases = [
            ("openai", &self.api_bases.openai),
            ("anthropic", &self.api_bases.anthropic),
            ("gemini", &self.api_bases.gemini),
        ];
        for (label, base) in bases {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(AnalystError::Configuration(format!(
                    "{label} API base must be an http(s) URL, got '{base}'"
                )));
            }
        }

        Ok(())
    }
}

/// Builder for AnalystConfig
#[derive(Debug, Default)]
pub struct AnalystConfigBuilder {
    provider: Option<Provider>,
    mode: Option<AnalysisMode>,
    models: Option<ModelSettings>,
    output_token_cap: Option<usize>,
    gemini_output_token_cap: Option<usize>,
    request_timeout: Option<Duration>,
    knowledge_path: Option<PathBuf>,
    context_char_limit: Option<usize>,
    api_bases: Option<ApiBases>,
}

impl AnalystConfigBuilder {
    /// Set the default vendor
    pub fn provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the analysis mode
    pub fn mode(mut self, mode: AnalysisMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set all model names
    pub fn models(mut self, models: ModelSettings) -> Self {
        self.models = Some(models);
        self
    }

    /// Set the OpenAI/Anthropic output token cap
    pub fn output_token_cap(mut self, cap: usize) -> Self {
        self.output_token_cap = Some(cap);
        self
    }

    /// Cap Gemini output as well
    pub fn gemini_output_token_cap(mut self, cap: usize) -> Self {
        self.gemini_output_token_cap = Some(cap);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the lessons file
    pub fn knowledge_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.knowledge_path = Some(path.into());
        self
    }

    /// Truncate long contexts to this many chars
    pub fn context_char_limit(mut self, limit: usize) -> Self {
        self.context_char_limit = Some(limit);
        self
    }

    /// Set vendor endpoints
    pub fn api_bases(mut self, bases: ApiBases) -> Self {
        self.api_bases = Some(bases);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AnalystConfig> {
        let defaults = AnalystConfig::default();

        let config = AnalystConfig {
            provider: self.provider.unwrap_or(defaults.provider),
            mode: self.mode.unwrap_or(defaults.mode),
            models: self.models.unwrap_or(defaults.models),
            output_token_cap: self.output_token_cap.unwrap_or(defaults.output_token_cap),
            gemini_output_token_cap: self.gemini_output_token_cap,
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            knowledge_path: self.knowledge_path.unwrap_or(defaults.knowledge_path),
            context_char_limit: self.context_char_limit,
            api_bases: self.api_bases.unwrap_or(defaults.api_bases),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalystConfig::default();
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.mode, AnalysisMode::SmartMoneyConcepts);
        assert_eq!(config.output_token_cap, 1000);
        assert_eq!(config.gemini_output_token_cap, None);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.knowledge_path, PathBuf::from("knowledge.txt"));
        assert_eq!(config.context_char_limit, None);
        assert_eq!(config.model_for(Provider::OpenAI), "gpt-4o");
        assert_eq!(config.model_for(Provider::Anthropic), "claude-3-5-sonnet-20240620");
        assert_eq!(config.model_for(Provider::Gemini), "gemini-3-pro-preview");
        assert_eq!(config.models.gemini_secondary, "gemini-3-flash-preview");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = AnalystConfig::builder()
            .provider(Provider::Gemini)
            .mode(AnalysisMode::GeneralTa)
            .output_token_cap(1500)
            .request_timeout(Duration::from_secs(30))
            .knowledge_path("/tmp/lessons.txt")
            .context_char_limit(4000)
            .build()
            .unwrap();

        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.mode, AnalysisMode::GeneralTa);
        assert_eq!(config.output_token_cap, 1500);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.knowledge_path, PathBuf::from("/tmp/lessons.txt"));
        assert_eq!(config.context_char_limit, Some(4000));
    }

    #[test]
    fn test_validation() {
        assert!(AnalystConfig::builder().output_token_cap(0).build().is_err());
        assert!(AnalystConfig::builder().request_timeout(Duration::ZERO).build().is_err());
        assert!(AnalystConfig::builder().context_char_limit(0).build().is_err());

        let models = ModelSettings {
            gemini_secondary: " ".to_string(),
            ..ModelSettings::default()
        };
        let err = AnalystConfig::builder().models(models).build().unwrap_err();
        assert!(matches!(err, AnalystError::Configuration(ref msg) if msg.contains("gemini secondary")));

        let bases = ApiBases {
            anthropic: "api.anthropic.com".to_string(),
            ..ApiBases::default()
        };
        assert!(AnalystConfig::builder().api_bases(bases).build().is_err());
    }

    #[test]
    fn test_env_overrides() {
        // SAFETY: only this test touches these variables
        unsafe {
            std::env::set_var("SCALP_OPENAI_MODEL", "gpt-4o-mini");
            std::env::set_var("SCALP_GEMINI_SECONDARY_MODEL", "gemini-2.5-flash");
            std::env::set_var("SCALP_OUTPUT_TOKEN_CAP", "2048");
            std::env::set_var("SCALP_TIMEOUT_SECS", "not-a-number");
            std::env::set_var("GEMINI_API_BASE", "http://localhost:8080/v1beta");
        }

        let config = AnalystConfig::default().with_env_overrides();
        assert_eq!(config.models.openai, "gpt-4o-mini");
        assert_eq!(config.models.gemini_secondary, "gemini-2.5-flash");
        assert_eq!(config.output_token_cap, 2048);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.api_bases.gemini, "http://localhost:8080/v1beta");

        unsafe {
            std::env::remove_var("SCALP_OPENAI_MODEL");
            std::env::remove_var("SCALP_GEMINI_SECONDARY_MODEL");
            std::env::remove_var("SCALP_OUTPUT_TOKEN_CAP");
            std::env::remove_var("SCALP_TIMEOUT_SECS");
            std::env::remove_var("GEMINI_API_BASE");
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let config = AnalystConfig::builder()
            .provider(Provider::Anthropic)
            .context_char_limit(2000)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AnalystConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
