//! Chart analysis orchestration
//!
//! This crate turns a chart screenshot plus trader context into one call to a
//! hosted multimodal model and hands back the markdown it produces. It
//! includes:
//!
//! - PNG/base64 image codec
//! - System prompts for each analysis mode and for post-trade review
//! - The context builder (timeframe, risk, rules, past lessons, notes)
//! - The append-only lessons file
//! - [`ChartAnalyst`], the entry point tying it all to a provider adapter
//!
//! # Example
//!
//! ```rust,no_run
//! use scalp_analyst::{AnalysisContext, AnalystConfig, ChartAnalyst, ChartImage, Provider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let analyst = ChartAnalyst::new(AnalystConfig::default())?;
//!     let image = ChartImage::open("chart.png")?;
//!
//!     let markdown = analyst
//!         .analyze_with_context(
//!             Provider::Anthropic,
//!             "sk-ant-...",
//!             image,
//!             AnalysisContext::builder().notes("Price just tapped a demand zone"),
//!         )
//!         .await?;
//!     println!("{markdown}");
//!     Ok(())
//! }
//! ```

pub mod analyst;
pub mod codec;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod prompts;

// Re-export main types for convenience
pub use analyst::{AnalysisRequest, ChartAnalyst, ReviewRequest, TradeOutcome};
pub use codec::{ChartImage, CodecError, decode_base64_png, encode_png_base64};
pub use config::{AnalystConfig, AnalystConfigBuilder, ApiBases, ModelSettings};
pub use error::{AnalystError, Result};
pub use knowledge::{DEFAULT_KNOWLEDGE_PATH, KnowledgeBase};
pub use prompts::{AnalysisContext, AnalysisContextBuilder, AnalysisMode, RiskParams, Timeframe};

pub use scalp_llm::Provider;
