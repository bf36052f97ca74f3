//! Third-party integration entries.

use serde_json::{Map, Value};

/// A stored integration: client-defined fields plus a string `id`
pub type Integration = Map<String, Value>;

pub fn integration_id(integration: &Integration) -> Option<&str> {
    integration.get("id").and_then(Value::as_str)
}

pub fn integration_name(integration: &Integration) -> String {
    integration
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
