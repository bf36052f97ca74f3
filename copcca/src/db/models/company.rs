//! Per-team company settings.

use serde_json::{Map, Value, json};

/// Settings returned to a team that has never saved any
pub fn default_company_settings() -> Map<String, Value> {
    let mut settings = Map::new();
    settings.insert("companyName".into(), json!(""));
    settings.insert("showCompanyName".into(), json!(true));
    settings
}

pub fn company_name(settings: &Map<String, Value>) -> Option<&str> {
    settings
        .get("companyName")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
