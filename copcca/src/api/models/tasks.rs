//! Task API models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    db::models::tasks::{TaskDBResponse, TaskPriority, TaskStats, TaskStatus, TaskUpdateDBRequest},
    types::{TeamId, UserId},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreate {
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub assigned_to: Option<UserId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub assigned_by: Option<UserId>,
    pub assigned_by_name: Option<String>,
    pub assigned_to_name: Option<String>,
    pub assigned_to_phone: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    /// Defaults to seven days from now
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub assigned_to: Option<UserId>,
    pub assigned_to_name: Option<String>,
    pub assigned_to_phone: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
}

impl From<TaskUpdate> for TaskUpdateDBRequest {
    fn from(update: TaskUpdate) -> Self {
        Self {
            title: update.title,
            description: update.description,
            assigned_to: update.assigned_to,
            assigned_to_name: update.assigned_to_name,
            assigned_to_phone: update.assigned_to_phone,
            status: update.status,
            priority: update.priority,
            due_date: update.due_date,
            feedback: update.feedback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskStatusUpdate {
    pub status: TaskStatus,
    /// Existing feedback is kept when omitted
    pub feedback: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    /// Every task of the team (admin)
    #[serde(default)]
    pub all: bool,
    /// Tasks involving this user (admin)
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatsQuery {
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[schema(value_type = String, format = "uuid")]
    pub assigned_to: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub assigned_by: UserId,
    pub assigned_by_name: String,
    pub assigned_to_name: String,
    pub assigned_to_phone: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    pub team_id: TeamId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub feedback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<TaskDBResponse> for TaskResponse {
    fn from(task: TaskDBResponse) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            assigned_to: task.assigned_to,
            assigned_by: task.assigned_by,
            assigned_by_name: task.assigned_by_name,
            assigned_to_name: task.assigned_to_name,
            assigned_to_phone: task.assigned_to_phone,
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            team_id: task.team_id,
            created_at: task.created_at,
            updated_at: task.updated_at,
            feedback: task.feedback,
            completed_at: task.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskRecordResponse {
    pub success: bool,
    pub record: TaskResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskListResponse {
    pub success: bool,
    pub records: Vec<TaskResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskStatsResponse {
    pub success: bool,
    pub stats: TaskStats,
}
