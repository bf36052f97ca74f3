//! Saved AI analysis snapshots, one per date and period.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiReport {
    pub date: String,
    /// `daily`, `weekly`, `monthly` ... as chosen by the client
    pub period: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub insights: Value,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metrics: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AiReportSaveDBRequest {
    pub date: String,
    pub period: String,
    pub insights: Value,
    pub metrics: Value,
}
