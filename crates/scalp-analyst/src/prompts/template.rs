//! MiniJinja-backed prompt templates

use minijinja::Environment;
use minijinja::value::Value;

use crate::error::{AnalystError, Result};

/// A named template rendered with MiniJinja
///
/// Variables are injected as values, so caller text containing `{{` or
/// `{%` is printed as-is and never evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    name: &'static str,
    source: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    /// Render with the given variables
    pub fn render(&self, vars: &serde_json::Value) -> Result<String> {
        // A fresh environment per render keeps the template free of lifetimes
        let env = Environment::new();
        env.render_str(self.source, Value::from_serialize(vars))
            .map_err(|e| AnalystError::Prompt(format!("failed to render '{}': {e}", self.name)))
    }
}
