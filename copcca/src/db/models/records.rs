//! Per-user record collections.
//!
//! Records are schemaless JSON objects owned by one user. The server only guarantees `id`,
//! `createdAt` and `updatedAt`; every other field belongs to the client. Each mutation is
//! described as an activity feed entry whose wording depends on the collection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

use super::activities::{ActivityCreateDBRequest, Priority};

/// A stored record: a JSON object with a numeric `id`
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Aftersales,
    Competitor,
    Myproducts,
    Debt,
    Sales,
    Kpi,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Aftersales,
        Collection::Competitor,
        Collection::Myproducts,
        Collection::Debt,
        Collection::Sales,
        Collection::Kpi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Aftersales => "aftersales",
            Collection::Competitor => "competitor",
            Collection::Myproducts => "myproducts",
            Collection::Debt => "debt",
            Collection::Sales => "sales",
            Collection::Kpi => "kpi",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown collection '{s}'"))
    }
}

/// Numeric id of a record, if it has one.
pub fn record_id(record: &Record) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

/// Render a field for display: strings verbatim, numbers and booleans via JSON.
pub fn field_text(record: &Record, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Prefer the value in `updates`, then the stored record.
fn updated_text(updates: &Record, record: &Record, key: &str) -> Option<String> {
    field_text(updates, key).or_else(|| field_text(record, key))
}

#[derive(Debug, Clone, Copy)]
pub enum RecordChange<'a> {
    Created(&'a Record),
    /// `record` is the merged result, `updates` what the client sent
    Updated { record: &'a Record, updates: &'a Record },
    Deleted { id: i64, record: &'a Record },
}

fn strategy_category(record: &Record) -> &'static str {
    match record.get("type").and_then(Value::as_str) {
        Some("marketing") => "Marketing Strategy",
        _ => "Sales Strategy",
    }
}

fn debt_priority(record: &Record) -> Priority {
    let days = record.get("daysOverdue").and_then(Value::as_f64).unwrap_or(0.0);
    if days > 60.0 {
        Priority::Critical
    } else if days > 30.0 {
        Priority::High
    } else {
        Priority::Medium
    }
}

fn competitor_item(record: &Record, updates: Option<&Record>) -> Option<String> {
    let key = match record.get("type").and_then(Value::as_str) {
        Some("product") => "productName",
        _ => "competitor",
    };
    match updates {
        Some(updates) => updated_text(updates, record, key),
        None => field_text(record, key),
    }
}

fn competitor_kind(record: &Record) -> String {
    field_text(record, "type").unwrap_or_else(|| "competitor".to_string())
}

/// Describe a record mutation for the owner's activity feed.
pub fn describe_change(collection: Collection, change: RecordChange<'_>) -> ActivityCreateDBRequest {
    use RecordChange::*;

    let deleted = |id: i64| format!("Record #{id}");

    match (collection, change) {
        (Collection::Aftersales, Created(r)) => ActivityCreateDBRequest::new(
            "After Sales",
            "Added new customer",
            field_text(r, "customer").unwrap_or_default(),
            Priority::Low,
        ),
        (Collection::Aftersales, Updated { record, updates }) => ActivityCreateDBRequest::new(
            "After Sales",
            "Updated customer",
            updated_text(updates, record, "customer").unwrap_or_default(),
            Priority::Low,
        ),
        (Collection::Aftersales, Deleted { id, .. }) => {
            ActivityCreateDBRequest::new("After Sales", "Deleted customer", deleted(id), Priority::Low)
        }

        (Collection::Competitor, Created(r)) => ActivityCreateDBRequest::new(
            "Competitor Information",
            format!("Added {}", competitor_kind(r)),
            competitor_item(r, None).unwrap_or_else(|| "New entry".to_string()),
            Priority::Medium,
        ),
        (Collection::Competitor, Updated { record, updates }) => ActivityCreateDBRequest::new(
            "Competitor Information",
            format!("Updated {}", competitor_kind(record)),
            competitor_item(record, Some(updates)).unwrap_or_else(|| "Entry".to_string()),
            Priority::Low,
        ),
        (Collection::Competitor, Deleted { id, .. }) => {
            ActivityCreateDBRequest::new("Competitor Information", "Deleted competitor", deleted(id), Priority::Low)
        }

        (Collection::Myproducts, Created(r)) => ActivityCreateDBRequest::new(
            "Competitor Information",
            "Added my product",
            field_text(r, "productName").unwrap_or_else(|| "New product".to_string()),
            Priority::Medium,
        ),
        (Collection::Myproducts, Updated { record, updates }) => ActivityCreateDBRequest::new(
            "Competitor Information",
            "Updated my product",
            updated_text(updates, record, "productName").unwrap_or_default(),
            Priority::Low,
        ),
        (Collection::Myproducts, Deleted { id, .. }) => {
            ActivityCreateDBRequest::new("Competitor Information", "Deleted my product", deleted(id), Priority::Low)
        }

        (Collection::Debt, Created(r)) => ActivityCreateDBRequest::new(
            "Debt Collection",
            "Added pending payment",
            format!(
                "{} - ${}",
                field_text(r, "customer").unwrap_or_default(),
                field_text(r, "amount").unwrap_or_default()
            ),
            debt_priority(r),
        ),
        (Collection::Debt, Updated { record, updates }) => ActivityCreateDBRequest::new(
            "Debt Collection",
            "Updated payment",
            updated_text(updates, record, "customer").unwrap_or_default(),
            Priority::Medium,
        ),
        (Collection::Debt, Deleted { id, .. }) => {
            ActivityCreateDBRequest::new("Debt Collection", "Resolved payment", deleted(id), Priority::Low)
        }

        (Collection::Sales, Created(r)) => ActivityCreateDBRequest::new(
            strategy_category(r),
            "Added new strategy",
            field_text(r, "title").unwrap_or_else(|| "New strategy".to_string()),
            Priority::Medium,
        ),
        (Collection::Sales, Updated { record, updates }) => ActivityCreateDBRequest::new(
            strategy_category(record),
            "Updated strategy",
            updated_text(updates, record, "title").unwrap_or_default(),
            Priority::Low,
        ),
        (Collection::Sales, Deleted { id, record }) => ActivityCreateDBRequest::new(
            strategy_category(record),
            "Deleted strategy",
            field_text(record, "title").unwrap_or_else(|| deleted(id)),
            Priority::Low,
        ),

        (Collection::Kpi, Created(r)) => ActivityCreateDBRequest::new(
            "KPI Tracking",
            "Added KPI metric",
            field_text(r, "name")
                .or_else(|| field_text(r, "metric"))
                .unwrap_or_else(|| "New KPI".to_string()),
            Priority::Low,
        ),
        (Collection::Kpi, Updated { record, updates }) => ActivityCreateDBRequest::new(
            "KPI Tracking",
            "Updated KPI metric",
            updated_text(updates, record, "name")
                .or_else(|| updated_text(updates, record, "metric"))
                .unwrap_or_else(|| "KPI".to_string()),
            Priority::Low,
        ),
        (Collection::Kpi, Deleted { id, .. }) => {
            ActivityCreateDBRequest::new("KPI Tracking", "Deleted KPI metric", deleted(id), Priority::Low)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_collection_parsing() {
        assert_eq!("debt".parse::<Collection>().unwrap(), Collection::Debt);
        assert_eq!("myproducts".parse::<Collection>().unwrap(), Collection::Myproducts);
        assert!("invoices".parse::<Collection>().is_err());
        assert_eq!(Collection::Kpi.to_string(), "kpi");
    }

    #[test]
    fn test_debt_priority_follows_days_overdue() {
        let cases = [(75, Priority::Critical), (45, Priority::High), (10, Priority::Medium)];
        for (days, expected) in cases {
            let record = obj(json!({ "customer": "Duka Ltd", "amount": 1500, "daysOverdue": days }));
            let activity = describe_change(Collection::Debt, RecordChange::Created(&record));
            assert_eq!(activity.priority, expected, "{days} days overdue");
            assert_eq!(activity.details, "Duka Ltd - $1500");
            assert_eq!(activity.action, "Added pending payment");
        }
    }

    #[test]
    fn test_sales_category_depends_on_type() {
        let marketing = obj(json!({ "type": "marketing", "title": "Radio ads" }));
        let activity = describe_change(Collection::Sales, RecordChange::Created(&marketing));
        assert_eq!(activity.category, "Marketing Strategy");
        assert_eq!(activity.details, "Radio ads");

        let sales = obj(json!({}));
        let activity = describe_change(Collection::Sales, RecordChange::Created(&sales));
        assert_eq!(activity.category, "Sales Strategy");
        assert_eq!(activity.details, "New strategy");
    }

    #[test]
    fn test_updates_prefer_new_values() {
        let record = obj(json!({ "id": 1, "customer": "Old name" }));
        let updates = obj(json!({ "customer": "New name" }));
        let activity = describe_change(
            Collection::Aftersales,
            RecordChange::Updated {
                record: &record,
                updates: &updates,
            },
        );
        assert_eq!(activity.details, "New name");
    }

    #[test]
    fn test_competitor_products_use_product_name() {
        let record = obj(json!({ "type": "product", "productName": "Soda 500ml" }));
        let activity = describe_change(Collection::Competitor, RecordChange::Created(&record));
        assert_eq!(activity.action, "Added product");
        assert_eq!(activity.details, "Soda 500ml");
    }

    #[test]
    fn test_own_products_share_the_competitor_feed() {
        let record = obj(json!({ "id": 4, "productName": "Maziwa Fresh 1L" }));
        let added = describe_change(Collection::Myproducts, RecordChange::Created(&record));
        assert_eq!(
            (added.category.as_str(), added.action.as_str(), added.details.as_str()),
            ("Competitor Information", "Added my product", "Maziwa Fresh 1L")
        );
        assert_eq!(added.priority, Priority::Medium);

        let removed = describe_change(Collection::Myproducts, RecordChange::Deleted { id: 4, record: &record });
        assert_eq!(removed.category, "Competitor Information");
        assert_eq!(removed.priority, Priority::Low);
    }

    #[test]
    fn test_deletes_reference_the_id() {
        let record = obj(json!({ "id": 17 }));
        let activity = describe_change(Collection::Kpi, RecordChange::Deleted { id: 17, record: &record });
        assert_eq!(activity.details, "Record #17");
    }
}
