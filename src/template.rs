//! Path and filter template interpolation
//!
//! Handles `{variable}` placeholders in stream paths and filters, e.g.
//! `/companies({company_id})/items` or `Document_No eq '{gl_doc_no}'`.
//! Values come from the [`ExtractionContext`] built by the parent record.
//!
//! OData syntax that merely looks like a placeholder, such as
//! `purchaseInvoiceLines($expand=dimensionSetLines)`, is left alone because
//! only identifiers wrapped directly in braces are matched.

use crate::error::{Error, Result};
use crate::stream::ExtractionContext;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Regex for matching template variables: {variable}
static TEMPLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}").unwrap());

/// Render a template string with the given context
///
/// Fails with [`Error::UndefinedVariable`] listing every placeholder the
/// context cannot satisfy.
pub fn render(template: &str, ctx: &ExtractionContext) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match ctx.get(name) {
            Some(value) => value_to_string(value),
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

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
