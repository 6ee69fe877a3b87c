//! Alert template to anchored regex compilation.

use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unterminated placeholder starting at byte offset {offset}")]
    Unterminated { offset: usize },
    #[error("template produced an invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A compiled alert template: an anchored matcher over the full message plus
/// the output field keys aligned to its capture groups.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    field_keys: Vec<String>,
}

impl CompiledPattern {
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn field_keys(&self) -> &[String] {
        &self.field_keys
    }

    /// Whether the full message conforms to this pattern.
    pub fn matches(&self, message: &str) -> bool {
        self.regex.is_match(message)
    }
}

/// Compile an alert template into a `CompiledPattern`.
///
/// Literal runs are escaped for exact matching; every `{{name}}` becomes a
/// non-greedy capture group recorded under `friendly_names[name]`, or `name`
/// itself when no friendly name is configured. The pattern is anchored at
/// both ends and captures may span line breaks.
///
/// Compilation is deterministic and side-effect-free but not free; callers on
/// the alert path go through [`crate::extract::PatternCache`].
pub fn compile(
    template: &str,
    friendly_names: &HashMap<String, String>,
) -> Result<CompiledPattern, TemplateError> {
    let mut pattern = String::with_capacity(template.len() + 16);
    pattern.push_str("(?s)^");

    let mut field_keys = Vec::new();
    let mut rest = template;
    let mut consumed = 0usize;

    while let Some(start) = rest.find("{{") {
        pattern.push_str(&regex::escape(&rest[..start]));

        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or(TemplateError::Unterminated {
                offset: consumed + start,
            })?;

        let token = &after_open[..end];
        let key = friendly_names
            .get(token)
            .cloned()
            .unwrap_or_else(|| token.to_string());
        field_keys.push(key);
        pattern.push_str("(.*?)");

        consumed += start + 2 + end + 2;
        rest = &after_open[end + 2..];
    }

    pattern.push_str(&regex::escape(rest));
    pattern.push('$');

    let regex = Regex::new(&pattern)?;
    Ok(CompiledPattern { regex, field_keys })
}
