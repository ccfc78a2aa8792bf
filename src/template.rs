//! Endpoint path templates
//!
//! Child stream endpoints carry `{placeholder}` segments such as
//! `tickets/{ticket_id}/audits.json`, filled from the parent record.

use crate::error::{Error, Result};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Regex for matching placeholders: {name}
static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap());

/// Values available to a template
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: Map<String, Value>,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with a single variable
    pub fn with_var(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut ctx = Self::new();
        ctx.set(name, value);
        ctx
    }

    /// Set a variable
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

/// Render a template, failing on the first undefined or empty variable
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = PLACEHOLDER_REGEX.replace_all(template, |cap: &Captures<'_>| {
        let name = &cap[1];
        match ctx.get(name).and_then(value_to_segment) {
            Some(segment) => segment,
            None => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Check if a string contains placeholders
pub fn has_placeholders(s: &str) -> bool {
    PLACEHOLDER_REGEX.is_match(s)
}

/// Extract all placeholder names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    PLACEHOLDER_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Convert a JSON value into a path segment
fn value_to_segment(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
