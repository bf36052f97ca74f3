//! Activity feed entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::UserId;

/// Entries kept per user
pub const MAX_ACTIVITIES: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDBResponse {
    pub id: i64,
    pub time: DateTime<Utc>,
    pub category: String,
    pub action: String,
    pub details: String,
    pub priority: Priority,
    pub user_id: UserId,
}

/// What happened, before it is stamped with an id and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityCreateDBRequest {
    pub category: String,
    pub action: String,
    pub details: String,
    pub priority: Priority,
}

impl ActivityCreateDBRequest {
    pub fn new(
        category: impl Into<String>,
        action: impl Into<String>,
        details: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            category: category.into(),
            action: action.into(),
            details: details.into(),
            priority,
        }
    }
}
