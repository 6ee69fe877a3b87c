//! Field extraction from raw alert text.

use super::pattern::{compile, CompiledPattern, TemplateError};
use crate::domain::{FieldMap, FieldValue};
use std::collections::HashMap;
use tracing::debug;

/// Apply a compiled pattern to a raw alert message.
///
/// Returns `None` when the message does not conform to the pattern; a
/// no-match is a normal negative outcome, never a partial field map. Each
/// capture is trimmed and coerced per [`FieldValue::coerce`].
pub fn extract(message: &str, pattern: &CompiledPattern) -> Option<FieldMap> {
    let captures = match pattern.regex().captures(message) {
        Some(c) => c,
        None => {
            debug!(pattern = %pattern.regex(), "alert message did not match compiled pattern");
            return None;
        }
    };

    let mut fields = FieldMap::new();
    for (i, key) in pattern.field_keys().iter().enumerate() {
        let raw = captures.get(i + 1).map(|m| m.as_str()).unwrap_or("");
        fields.insert(key.clone(), FieldValue::coerce(raw));
    }
    Some(fields)
}

/// Pre-flight validation gate: does the message conform to the template?
///
/// Performs the same compilation and match as extraction without
/// materializing fields. A syntactically invalid template is an error, not a
/// mismatch.
pub fn template_matches(
    message: &str,
    alert_template: &str,
    friendly_names: &HashMap<String, String>,
) -> Result<bool, TemplateError> {
    let compiled = compile(alert_template, friendly_names)?;
    Ok(compiled.matches(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_plain(template: &str) -> CompiledPattern {
        compile(template, &HashMap::new()).unwrap()
    }

    #[test]
    fn test_round_trip_extraction() {
        let pattern = compile_plain("{{name}}: order {{action}} filled at {{price}}");
        let fields = extract("BTC strat: order buy filled at 100.5", &pattern).unwrap();
        assert_eq!(
            fields["name"],
            FieldValue::Text("BTC strat".to_string())
        );
        assert_eq!(fields["action"], FieldValue::Text("buy".to_string()));
        assert_eq!(fields["price"], FieldValue::Number(100.5));
    }

    #[test]
    fn test_mismatch_yields_none_never_partial() {
        let pattern = compile_plain("{{name}}: price = {{price}}");
        assert!(extract("completely different text", &pattern).is_none());
    }

    #[test]
    fn test_numeric_and_text_typing() {
        let pattern = compile_plain(
            "{{name}}: order buy {{contracts}} filled on {{ticker}}. Symbol = {{symbol}} price = {{price}}",
        );
        let fields = extract(
            "BTC: order buy 1.5 filled on BTCUSDT. Symbol = BTC price = 100",
            &pattern,
        )
        .unwrap();
        assert_eq!(fields["contracts"], FieldValue::Number(1.5));
        assert_eq!(fields["price"], FieldValue::Number(100.0));
        assert_eq!(fields["ticker"], FieldValue::Text("BTCUSDT".to_string()));
        assert_eq!(fields["symbol"], FieldValue::Text("BTC".to_string()));
    }

    #[test]
    fn test_empty_capture_is_empty_string() {
        let pattern = compile_plain("a{{x}}b");
        let fields = extract("ab", &pattern).unwrap();
        assert_eq!(fields["x"], FieldValue::Text(String::new()));
    }

    #[test]
    fn test_capture_spanning_newline() {
        let pattern = compile_plain("msg: {{body}}.");
        let fields = extract("msg: first\nsecond.", &pattern).unwrap();
        assert_eq!(
            fields["body"],
            FieldValue::Text("first\nsecond".to_string())
        );
    }

    #[test]
    fn test_template_matches_gate() {
        let names = HashMap::new();
        assert!(template_matches("hello world", "hello {{who}}", &names).unwrap());
        assert!(!template_matches("goodbye world", "hello {{who}}", &names).unwrap());
        assert!(template_matches("x", "broken {{", &names).is_err());
    }
}
