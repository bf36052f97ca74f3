//! Record collection, integration, activity feed and debt reminder models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    db::models::{
        activities::{ActivityDBResponse, Priority},
        integrations::Integration,
        records::Record,
    },
    types::UserId,
};

/// Whose records to read. Without parameters the caller's own.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQuery {
    /// A teammate's records (admin, same team)
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    /// Merge every team member's records (admin)
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordListResponse {
    #[schema(value_type = Vec<Object>)]
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordResponse {
    #[schema(value_type = Object)]
    pub record: Record,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ActivitiesQuery {
    /// Defaults to and is capped at 50
    pub limit: Option<usize>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub id: i64,
    pub time: DateTime<Utc>,
    pub category: String,
    pub action: String,
    pub details: String,
    pub priority: Priority,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    /// Set on merged team views
    #[serde(rename = "_userName", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(rename = "_userEmail", skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

impl From<ActivityDBResponse> for ActivityResponse {
    fn from(activity: ActivityDBResponse) -> Self {
        Self {
            id: activity.id,
            time: activity.time,
            category: activity.category,
            action: activity.action,
            details: activity.details,
            priority: activity.priority,
            user_id: activity.user_id,
            user_name: None,
            user_email: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityListResponse {
    pub activities: Vec<ActivityResponse>,
}

/// Debt records whose follow-up is due soon or already missed
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DebtRemindersResponse {
    #[schema(value_type = Vec<Object>)]
    pub upcoming: Vec<Record>,
    #[schema(value_type = Vec<Object>)]
    pub overdue: Vec<Record>,
}

/// Act on a teammate's integrations instead of the caller's (admin, same team)
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationsQuery {
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IntegrationListResponse {
    #[schema(value_type = Vec<Object>)]
    pub integrations: Vec<Integration>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IntegrationResponse {
    #[schema(value_type = Object)]
    pub integration: Integration,
}
