//! Prompt templates for chart analysis
//!
//! Templates are organized into:
//! - `system`: fixed system prompts, one per [`AnalysisMode`] plus the review coach
//! - `context`: the user-message context assembled from trader settings
//! - `template`: the MiniJinja rendering used by `context`

mod context;
mod system;
mod template;

pub use context::{
    AnalysisContext, AnalysisContextBuilder, RiskParams, Timeframe, render_review_context,
};
pub use system::{
    AnalysisMode, GENERAL_TA_SYSTEM_PROMPT, REVIEW_SYSTEM_PROMPT, SMC_SYSTEM_PROMPT,
};
pub use template::PromptTemplate;

pub(crate) use context::truncate_chars;
