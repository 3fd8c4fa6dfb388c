//! Degrading model fallback
//!
//! Vendors rename and retire preview models often, so an adapter that pins a
//! single model name eventually starts failing. [`FallbackChain`] walks three
//! states in order:
//!
//! 1. `Primary` - generate with the most capable configured model
//! 2. `Secondary` - entered only when primary fails; generate with a cheaper model
//! 3. `Diagnostic` - entered only when both fail; list the models the key can
//!    see and return them together with the primary error
//!
//! The chain never yields an empty result: it ends in generated text, a
//! diagnostic listing, or the primary error. When the listing itself fails the
//! primary error is returned; later errors are only logged.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{LLMError, Result, VisionRequest};

/// Backend operations the fallback chain needs from a vendor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generate text with a specific model
    async fn generate(&self, model: &str, request: &VisionRequest) -> Result<String>;

    /// Names of the models available to the current key
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// Where the chain stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStage {
    /// Primary model answered
    Primary,
    /// Secondary model answered
    Secondary,
    /// Both models failed; output is a model listing
    Diagnostic,
}

/// Terminal result of a successful chain run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// A model produced text
    Generated {
        /// Stage that produced it (`Primary` or `Secondary`)
        stage: FallbackStage,
        /// Model name used
        model: String,
        /// Generated text
        text: String,
    },
    /// Both models failed and the listing succeeded
    Diagnostic {
        /// Display form of the primary model's error
        primary_error: String,
        /// Models visible to the key
        available_models: Vec<String>,
        /// Human-readable message combining both
        text: String,
    },
}

impl FallbackOutcome {
    /// Stage the chain terminated in
    pub fn stage(&self) -> FallbackStage {
        match self {
            Self::Generated { stage, .. } => *stage,
            Self::Diagnostic { .. } => FallbackStage::Diagnostic,
        }
    }

    /// Text handed back to the caller
    pub fn text(&self) -> &str {
        match self {
            Self::Generated { text, .. } | Self::Diagnostic { text, .. } => text,
        }
    }

    /// Consume into the caller-facing text
    pub fn into_text(self) -> String {
        match self {
            Self::Generated { text, .. } | Self::Diagnostic { text, .. } => text,
        }
    }
}

/// Chain state; each non-initial state carries the error that caused entry
enum State {
    Primary,
    Secondary { primary_error: LLMError },
    Diagnostic { primary_error: LLMError, secondary_error: LLMError },
}

/// Primary/secondary model pair with diagnostic fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
    primary_model: String,
    secondary_model: String,
}

impl FallbackChain {
    /// Create a chain over two model names
    pub fn new(primary_model: impl Into<String>, secondary_model: impl Into<String>) -> Self {
        Self {
            primary_model: primary_model.into(),
            secondary_model: secondary_model.into(),
        }
    }

    /// Primary model name
    pub fn primary_model(&self) -> &str {
        &self.primary_model
    }

    /// Secondary model name
    pub fn secondary_model(&self) -> &str {
        &self.secondary_model
    }

    /// Run the chain against a backend
    pub async fn run<B>(&self, backend: &B, request: &VisionRequest) -> Result<FallbackOutcome>
    where
        B: ModelBackend + ?Sized,
    {
        let mut state = State::Primary;

        loop {
            state = match state {
                State::Primary => match backend.generate(&self.primary_model, request).await {
                    Ok(text) => {
                        return Ok(FallbackOutcome::Generated {
                            stage: FallbackStage::Primary,
                            model: self.primary_model.clone(),
                            text,
                        });
                    }
                    Err(primary_error) => {
                        warn!(
                            model = %self.primary_model,
                            error = %primary_error,
                            "Primary model failed, trying secondary"
                        );
                        State::Secondary { primary_error }
                    }
                },
                State::Secondary { primary_error } => {
                    match backend.generate(&self.secondary_model, request).await {
                        Ok(text) => {
                            return Ok(FallbackOutcome::Generated {
                                stage: FallbackStage::Secondary,
                                model: self.secondary_model.clone(),
                                text,
                            });
                        }
                        Err(secondary_error) => {
                            warn!(
                                model = %self.secondary_model,
                                error = %secondary_error,
                                "Secondary model failed, listing available models"
                            );
                            State::Diagnostic {
                                primary_error,
                                secondary_error,
                            }
                        }
                    }
                }
                State::Diagnostic {
                    primary_error,
                    secondary_error,
                } => {
                    debug!("Secondary failure was: {}", secondary_error);
                    return match backend.list_models().await {
                        Ok(available_models) => {
                            let text = diagnostic_message(&primary_error, &available_models);
                            Ok(FallbackOutcome::Diagnostic {
                                primary_error: primary_error.to_string(),
                                available_models,
                                text,
                            })
                        }
                        Err(listing_error) => {
                            warn!(error = %listing_error, "Model listing failed");
                            Err(primary_error)
                        }
                    };
                }
            };
        }
    }
}

fn diagnostic_message(primary_error: &LLMError, models: &[String]) -> String {
    let listing = if models.is_empty() {
        "(none)".to_string()
    } else {
        models.join(", ")
    };
    format!("Error: {primary_error}\n\nAvailable models: {listing}")
}
