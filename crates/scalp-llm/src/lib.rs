//! Multimodal LLM provider layer for scalp-trader
//!
//! This crate normalizes three vendor chat APIs (OpenAI, Anthropic, Gemini)
//! behind one interface: send a system prompt, free-text context and one
//! base64 image, get back the generated text. It includes:
//!
//! - Request types shared by every adapter
//! - The [`VisionProvider`] trait and the [`Provider`] selector
//! - A [`Transport`] seam so adapters can be exercised without a network
//! - The degrading model fallback used by the Gemini adapter

pub mod error;
pub mod fallback;
pub mod messages;
pub mod provider;
pub mod providers;
pub mod transport;

// Re-export main types
pub use error::{LLMError, Result};
pub use fallback::{FallbackChain, FallbackOutcome, FallbackStage, ModelBackend};
pub use messages::{EncodedImage, VisionRequest};
pub use provider::{Provider, VisionProvider};
pub use transport::{HttpMethod, HttpRequest, HttpTransport, Transport};
