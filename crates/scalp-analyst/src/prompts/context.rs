//! User-message context
//!
//! The model sees the chart plus one free-text context string. This module
//! assembles it from the trader's settings in a fixed order:
//!
//! `Timeframe: … Risk Params: … User Rules: … Past Lessons (Knowledge Base): … Context: …`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::template::PromptTemplate;
use crate::error::{AnalystError, Result};

const ANALYSIS_CONTEXT: PromptTemplate = PromptTemplate::new(
    "analysis_context",
    "Timeframe: {{ timeframe }}. Risk Params: Account Size: ${{ account_size }}. \
     Risk Per Trade: {{ risk_pct }}%. STRICT RULE: Minimum Risk:Reward Ratio of 1:2.. \
     User Rules: {{ rules }}. Past Lessons (Knowledge Base): {{ knowledge }}. Context: {{ notes }}",
);

const REVIEW_CONTEXT: PromptTemplate = PromptTemplate::new(
    "review_context",
    "Trade Outcome: {{ outcome }}. Trader Notes: {{ notes }}. \
     Past Lessons (Knowledge Base): {{ knowledge }}",
);

/// Chart timeframe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "Daily")]
    Daily,
}

impl Timeframe {
    pub const ALL: [Self; 6] = [Self::M1, Self::M5, Self::M15, Self::H1, Self::H4, Self::Daily];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::Daily => "Daily",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = AnalystError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" => Ok(Self::M1),
            "5m" => Ok(Self::M5),
            "15m" => Ok(Self::M15),
            "1h" | "60m" => Ok(Self::H1),
            "4h" => Ok(Self::H4),
            "daily" | "1d" | "d" => Ok(Self::Daily),
            other => Err(AnalystError::InvalidInput(format!(
                "unknown timeframe '{other}' (expected 1m, 5m, 15m, 1h, 4h or Daily)"
            ))),
        }
    }
}

/// Account size and per-trade risk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    account_size: u64,
    risk_pct: f64,
}

impl RiskParams {
    pub const MIN_ACCOUNT_SIZE: u64 = 10;
    pub const MIN_RISK_PCT: f64 = 0.1;
    pub const MAX_RISK_PCT: f64 = 5.0;

    /// Validated risk parameters
    ///
    /// `account_size` is in account currency units, `risk_pct` is the
    /// percentage of the account risked per trade.
    pub fn new(account_size: u64, risk_pct: f64) -> Result<Self> {
        if account_size < Self::MIN_ACCOUNT_SIZE {
            return Err(AnalystError::InvalidInput(format!(
                "account size must be at least {}, got {account_size}",
                Self::MIN_ACCOUNT_SIZE
            )));
        }
        if !(Self::MIN_RISK_PCT..=Self::MAX_RISK_PCT).contains(&risk_pct) {
            return Err(AnalystError::InvalidInput(format!(
                "risk per trade must be between {}% and {}%, got {risk_pct}%",
                Self::MIN_RISK_PCT,
                Self::MAX_RISK_PCT
            )));
        }
        Ok(Self {
            account_size,
            risk_pct,
        })
    }
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            account_size: 100,
            risk_pct: 1.0,
        }
    }
}

/// Everything the trader tells the model besides the chart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisContext {
    timeframe: Timeframe,
    risk: RiskParams,
    rules: String,
    knowledge: String,
    notes: String,
}

impl AnalysisContext {
    pub fn builder() -> AnalysisContextBuilder {
        AnalysisContextBuilder::default()
    }

    /// Render the context string
    ///
    /// With a `char_limit`, the oldest knowledge-base lines are dropped until
    /// the text fits. If it still does not fit without any lessons, it is cut
    /// at the limit.
    pub fn render(&self, char_limit: Option<usize>) -> Result<String> {
        match char_limit {
            Some(limit) => fit_knowledge(&self.knowledge, limit, |knowledge| {
                self.render_with_knowledge(knowledge)
            }),
            None => self.render_with_knowledge(&self.knowledge),
        }
    }

    fn render_with_knowledge(&self, knowledge: &str) -> Result<String> {
        ANALYSIS_CONTEXT.render(&json!({
            "timeframe": self.timeframe.as_str(),
            "account_size": self.risk.account_size,
            // Debug keeps every digit and a trailing `.0` on whole numbers
            "risk_pct": format!("{:?}", self.risk.risk_pct),
            "rules": self.rules,
            "knowledge": knowledge,
            "notes": self.notes,
        }))
    }
}

/// Builder for [`AnalysisContext`]
#[derive(Debug, Clone, Default)]
pub struct AnalysisContextBuilder {
    timeframe: Option<Timeframe>,
    risk: Option<RiskParams>,
    rules: Option<String>,
    knowledge: Option<String>,
    notes: Option<String>,
}

impl AnalysisContextBuilder {
    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = Some(timeframe);
        self
    }

    pub fn risk(mut self, risk: RiskParams) -> Self {
        self.risk = Some(risk);
        self
    }

    /// The trader's own standing rules
    pub fn rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = Some(rules.into());
        self
    }

    /// Raw knowledge-base text
    pub fn knowledge(mut self, knowledge: impl Into<String>) -> Self {
        self.knowledge = Some(knowledge.into());
        self
    }

    /// Whether knowledge-base text has been supplied
    pub fn has_knowledge(&self) -> bool {
        self.knowledge.is_some()
    }

    /// Free-form notes about the current chart
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn build(self) -> AnalysisContext {
        AnalysisContext {
            timeframe: self.timeframe.unwrap_or_default(),
            risk: self.risk.unwrap_or_default(),
            rules: self.rules.unwrap_or_default(),
            knowledge: self.knowledge.unwrap_or_default(),
            notes: self.notes.unwrap_or_default(),
        }
    }
}

/// Render the user message for a post-trade review
///
/// `char_limit` drops the oldest lessons first, like [`AnalysisContext::render`].
pub fn render_review_context(
    outcome: &str,
    notes: &str,
    knowledge: &str,
    char_limit: Option<usize>,
) -> Result<String> {
    let render = |knowledge: &str| {
        REVIEW_CONTEXT.render(&json!({
            "outcome": outcome,
            "notes": notes,
            "knowledge": knowledge,
        }))
    };
    match char_limit {
        Some(limit) => fit_knowledge(knowledge, limit, render),
        None => render(knowledge),
    }
}

/// Render `knowledge` through `render`, keeping only the newest lines that fit
///
/// The knowledge text is substituted verbatim, so its length adds directly
/// to the length of the bare render.
fn fit_knowledge<F>(knowledge: &str, limit: usize, render: F) -> Result<String>
where
    F: Fn(&str) -> Result<String>,
{
    let full = render(knowledge)?;
    if full.chars().count() <= limit {
        return Ok(full);
    }

    let bare = render("")?;
    let base = bare.chars().count();
    if base > limit {
        debug!(limit, "Context still too long without lessons, cutting");
        return Ok(truncate_chars(&bare, limit).to_string());
    }

    let lines: Vec<&str> = knowledge
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    let mut budget = limit - base;
    let mut first_kept = lines.len();
    for (idx, line) in lines.iter().enumerate().rev() {
        // each kept line is written back as "\n{line}"
        let cost = line.chars().count() + 1;
        if cost > budget {
            break;
        }
        budget -= cost;
        first_kept = idx;
    }

    let kept: String = lines[first_kept..]
        .iter()
        .map(|line| format!("\n{line}"))
        .collect();
    debug!(dropped = first_kept, limit, "Dropped oldest lessons to fit context");
    let rendered = render(&kept)?;
    Ok(truncate_chars(&rendered, limit).to_string())
}

/// Longest prefix of `text` with at most `limit` chars
pub(crate) fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
