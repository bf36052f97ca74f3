//! Task assignment documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{TeamId, UserId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Assigned,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDBResponse {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assigned_to: UserId,
    pub assigned_by: UserId,
    pub assigned_by_name: String,
    pub assigned_to_name: String,
    #[serde(default)]
    pub assigned_to_phone: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    pub team_id: TeamId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskDBResponse {
    pub fn involves(&self, user_id: &UserId) -> bool {
        &self.assigned_to == user_id || &self.assigned_by == user_id
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Completed && self.due_date < now
    }

    /// Move to `status`, stamping `completedAt` on the first transition into completed.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        if status == TaskStatus::Completed && self.status != TaskStatus::Completed {
            self.completed_at = Some(now);
        }
        self.status = status;
    }
}

#[derive(Debug, Clone)]
pub struct TaskCreateDBRequest {
    pub title: String,
    pub description: String,
    pub assigned_to: UserId,
    pub assigned_by: UserId,
    pub assigned_by_name: String,
    pub assigned_to_name: String,
    pub assigned_to_phone: String,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    pub team_id: TeamId,
}

#[derive(Debug, Clone, Default)]
pub struct TaskUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<UserId>,
    pub assigned_to_name: Option<String>,
    pub assigned_to_phone: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
}

/// Filter for listing tasks
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub team_id: Option<TeamId>,
    /// Tasks assigned to or by this user
    pub involving: Option<UserId>,
    /// Tasks assigned to this user
    pub assigned_to: Option<UserId>,
}

impl TaskFilter {
    pub fn matches(&self, task: &TaskDBResponse) -> bool {
        self.team_id.as_ref().is_none_or(|t| &task.team_id == t)
            && self.involving.is_none_or(|u| task.involves(&u))
            && self.assigned_to.is_none_or(|u| task.assigned_to == u)
    }
}

/// Counters returned by the task statistics endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub assigned: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub overdue: usize,
    pub high_priority: usize,
}

impl TaskStats {
    pub fn compute(tasks: &[TaskDBResponse], now: DateTime<Utc>) -> Self {
        let mut stats = TaskStats {
            total: tasks.len(),
            ..Default::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Assigned => stats.assigned += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
            if task.is_overdue(now) {
                stats.overdue += 1;
            }
            if task.priority == TaskPriority::High && task.status != TaskStatus::Completed {
                stats.high_priority += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn task(status: TaskStatus, priority: TaskPriority, due_in_days: i64) -> TaskDBResponse {
        let now = Utc::now();
        TaskDBResponse {
            id: 1,
            title: "Call supplier".into(),
            description: String::new(),
            assigned_to: Uuid::new_v4(),
            assigned_by: Uuid::new_v4(),
            assigned_by_name: "Admin".into(),
            assigned_to_name: "User".into(),
            assigned_to_phone: String::new(),
            status,
            priority,
            due_date: now + Duration::days(due_in_days),
            team_id: "team-1".into(),
            created_at: now,
            updated_at: now,
            feedback: String::new(),
            completed_at: None,
        }
    }

    #[test]
    fn test_stats() {
        let tasks = vec![
            task(TaskStatus::Assigned, TaskPriority::High, -1),
            task(TaskStatus::InProgress, TaskPriority::Medium, 3),
            task(TaskStatus::Completed, TaskPriority::High, -5),
        ];
        let stats = TaskStats::compute(&tasks, Utc::now());
        assert_eq!(
            stats,
            TaskStats {
                total: 3,
                assigned: 1,
                in_progress: 1,
                completed: 1,
                overdue: 1,
                high_priority: 1,
            }
        );
    }

    #[test]
    fn test_completed_at_is_stamped_once() {
        let mut t = task(TaskStatus::InProgress, TaskPriority::Low, 1);
        let first = Utc::now();
        t.set_status(TaskStatus::Completed, first);
        assert_eq!(t.completed_at, Some(first));

        t.set_status(TaskStatus::Completed, first + Duration::hours(1));
        assert_eq!(t.completed_at, Some(first));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"in_progress\"");
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
    }
}
