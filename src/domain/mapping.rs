//! Webhook endpoint and mapping configuration rows.
//!
//! The pipeline consumes these read-only: they are re-read per invocation so
//! edits take effect on the next alert, never mid-processing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An inbound endpoint. Alerts arrive at `POST /event/:endpoint_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: i64,
    pub endpoint_id: String,
    pub owner_id: String,
    pub name: String,
    pub is_active: bool,
}

/// One alert-template-to-output-template association for a webhook.
///
/// `friendly_names` maps placeholder names appearing in `alert_template` to
/// the field keys used downstream. `closed_template` is selected when
/// correlation found prior open records; `default_template` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub id: i64,
    pub webhook_id: i64,
    pub alert_template: String,
    pub friendly_names: HashMap<String, String>,
    pub default_template: String,
    pub closed_template: String,
    pub position: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_serialization_round_trip() {
        let mapping = Mapping {
            id: 1,
            webhook_id: 2,
            alert_template: "{{name}}: price = {{p}}".to_string(),
            friendly_names: HashMap::from([("p".to_string(), "price".to_string())]),
            default_template: "Alert {{name}} at {{price}}".to_string(),
            closed_template: "Closed {{name}} {{profitLoss}}".to_string(),
            position: 0,
        };
        let json = serde_json::to_string(&mapping).unwrap();
        let back: Mapping = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mapping);
    }
}
