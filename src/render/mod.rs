//! Output template rendering.
//!
//! Substitutes `{{key}}` tokens with extracted field values. Unresolved
//! tokens stay literal so a template authored for one mapping schema degrades
//! gracefully on partial data instead of failing the alert.

use crate::domain::FieldMap;
use regex::Regex;
use std::sync::OnceLock;

/// Reserved field key carrying the formatted correlation percentage.
pub const PROFIT_LOSS_FIELD: &str = "profitLoss";

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").expect("token regex is valid"))
}

/// Render a template against extracted fields.
///
/// Every `{{key}}` whose key exists in `fields` is replaced with the value's
/// string form; unknown keys are left as literal token text. Literal `\n`
/// escape sequences in the template become real line breaks after
/// substitution.
pub fn render(template: &str, fields: &FieldMap) -> String {
    let substituted = token_regex().replace_all(template, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        match fields.get(key) {
            Some(value) => value.render(),
            None => caps[0].to_string(),
        }
    });
    substituted.replace("\\n", "\n")
}

/// Format the correlation percentage for rendering: explicit sign, two
/// decimals, e.g. `+10.00%`, `-3.50%`, `+0.00%`.
pub fn format_percentage(percentage: f64) -> String {
    format!("{:+.2}%", percentage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldValue;

    fn fields(pairs: &[(&str, FieldValue)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_substitutes_known_keys() {
        let f = fields(&[
            ("name", FieldValue::Text("BTC long".to_string())),
            ("price", FieldValue::Number(100.0)),
        ]);
        let out = render("Signal {{name}} at {{price}}", &f);
        assert_eq!(out, "Signal BTC long at 100");
    }

    #[test]
    fn test_unresolved_keys_left_literal() {
        let f = fields(&[("name", FieldValue::Text("x".to_string()))]);
        let out = render("{{name}} / {{missing}}", &f);
        assert_eq!(out, "x / {{missing}}");
    }

    #[test]
    fn test_whitespace_inside_token() {
        let f = fields(&[("name", FieldValue::Text("x".to_string()))]);
        assert_eq!(render("{{ name }}", &f), "x");
    }

    #[test]
    fn test_newline_escapes_converted() {
        let f = fields(&[("a", FieldValue::Text("1".to_string()))]);
        assert_eq!(render("{{a}}\\nnext", &f), "1\nnext");
    }

    #[test]
    fn test_profit_loss_injection() {
        let mut f = fields(&[("name", FieldValue::Text("btc".to_string()))]);
        f.insert(
            PROFIT_LOSS_FIELD.to_string(),
            FieldValue::Text(format_percentage(12.5)),
        );
        let out = render("{{name}} closed {{profitLoss}}", &f);
        assert_eq!(out, "btc closed +12.50%");
    }

    #[test]
    fn test_format_percentage_signs() {
        assert_eq!(format_percentage(10.0), "+10.00%");
        assert_eq!(format_percentage(-25.0), "-25.00%");
        assert_eq!(format_percentage(0.0), "+0.00%");
        assert_eq!(format_percentage(12.5), "+12.50%");
    }
}
