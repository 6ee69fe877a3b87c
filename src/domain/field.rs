//! Dynamically typed values extracted from alert messages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Map from output field key to its extracted value.
pub type FieldMap = HashMap<String, FieldValue>;

/// A value captured from an alert message.
///
/// Captures that parse entirely as a finite decimal number are stored as
/// `Number`; everything else, including empty captures, stays `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Coerce a raw capture into a typed value.
    ///
    /// The capture is trimmed first. An empty capture is always `Text("")`,
    /// never a number.
    pub fn coerce(raw: &str) -> FieldValue {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return FieldValue::Text(String::new());
        }
        match trimmed.parse::<f64>() {
            // "inf"/"nan" parse as f64 in Rust but are not decimal numbers
            // in any alert we accept.
            Ok(n) if n.is_finite() && trimmed.chars().next().is_some_and(is_numeric_start) => {
                FieldValue::Number(n)
            }
            _ => FieldValue::Text(trimmed.to_string()),
        }
    }

    /// String form used during template substitution.
    ///
    /// Whole numbers render without a trailing fraction ("100", not "100.0").
    pub fn render(&self) -> String {
        match self {
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            FieldValue::Text(s) => s.clone(),
        }
    }

    /// Numeric view, if this value is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    /// True when the value renders to an empty string.
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

fn is_numeric_start(c: char) -> bool {
    c.is_ascii_digit() || c == '-' || c == '+' || c == '.'
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}
