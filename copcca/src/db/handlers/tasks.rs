//! Repository for tasks.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::try_join_all;
use tracing::instrument;

use crate::db::{
    Store,
    errors::{DbError, Result},
    handlers::repository::Repository,
    keys,
    models::tasks::{TaskCreateDBRequest, TaskDBResponse, TaskFilter, TaskStatus, TaskUpdateDBRequest},
};

pub struct Tasks<'a> {
    store: &'a Store,
}

impl<'a> Tasks<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    async fn all(&self) -> Result<Vec<TaskDBResponse>> {
        self.store.values_by_prefix(keys::TASK_PREFIX).await
    }
}

#[async_trait::async_trait]
impl<'a> Repository for Tasks<'a> {
    type CreateRequest = TaskCreateDBRequest;
    type UpdateRequest = TaskUpdateDBRequest;
    type Response = TaskDBResponse;
    type Id = i64;
    type Filter = TaskFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // Ids are allocated as max + 1 across all tasks
        let _guard = self.store.lock(keys::TASK_PREFIX).await;
        let next_id = self.all().await?.iter().map(|t| t.id).max().unwrap_or(0) + 1;

        let now = Utc::now();
        let task = TaskDBResponse {
            id: next_id,
            title: request.title.clone(),
            description: request.description.clone(),
            assigned_to: request.assigned_to,
            assigned_by: request.assigned_by,
            assigned_by_name: request.assigned_by_name.clone(),
            assigned_to_name: request.assigned_to_name.clone(),
            assigned_to_phone: request.assigned_to_phone.clone(),
            status: TaskStatus::Assigned,
            priority: request.priority,
            due_date: request.due_date,
            team_id: request.team_id.clone(),
            created_at: now,
            updated_at: now,
            feedback: String::new(),
            completed_at: None,
        };

        self.store.set_json(&keys::task(task.id), &task).await?;
        Ok(task)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        self.store.get_json(&keys::task(id)).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let store = self.store;
        let found = try_join_all(ids.iter().map(|id| {
            let key = keys::task(*id);
            async move { store.get_json::<TaskDBResponse>(&key).await }
        })).await?;
        Ok(found.into_iter().flatten().map(|t| (t.id, t)).collect())
    }

    /// Matching tasks, newest first.
    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut tasks: Vec<TaskDBResponse> = self.all().await?.into_iter().filter(|t| filter.matches(t)).collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let key = keys::task(id);
        let _guard = self.store.lock(&key).await;
        self.store.del(&key).await
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let key = keys::task(id);
        let _guard = self.store.lock(&key).await;
        let mut task: TaskDBResponse = self.store.get_json(&key).await?.ok_or(DbError::NotFound)?;
        let now = Utc::now();

        if let Some(title) = &request.title {
            task.title = title.clone();
        }
        if let Some(description) = &request.description {
            task.description = description.clone();
        }
        if let Some(assigned_to) = request.assigned_to {
            task.assigned_to = assigned_to;
        }
        if let Some(name) = &request.assigned_to_name {
            task.assigned_to_name = name.clone();
        }
        if let Some(phone) = &request.assigned_to_phone {
            task.assigned_to_phone = phone.clone();
        }
        if let Some(priority) = request.priority {
            task.priority = priority;
        }
        if let Some(due_date) = request.due_date {
            task.due_date = due_date;
        }
        if let Some(feedback) = request.feedback.as_ref().filter(|f| !f.is_empty()) {
            task.feedback = feedback.clone();
        }
        if let Some(status) = request.status {
            task.set_status(status, now);
        }
        task.updated_at = now;

        self.store.set_json(&key, &task).await?;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use crate::db::models::tasks::TaskPriority;
    use chrono::Duration;
    use std::sync::Arc;
    use uuid::Uuid;

    fn request(team: &str, to: Uuid, by: Uuid) -> TaskCreateDBRequest {
        TaskCreateDBRequest {
            title: "Visit Kariakoo shop".into(),
            description: String::new(),
            assigned_to: to,
            assigned_by: by,
            assigned_by_name: "Admin".into(),
            assigned_to_name: "User".into(),
            assigned_to_phone: String::new(),
            priority: TaskPriority::Medium,
            due_date: Utc::now() + Duration::days(7),
            team_id: team.into(),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_ids_are_sequential() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Tasks::new(&store);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let first = repo.create(&request("t", a, b)).await.unwrap();
        let second = repo.create(&request("t", a, b)).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        repo.delete(2).await.unwrap();
        assert_eq!(repo.create(&request("t", a, b)).await.unwrap().id, 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_list_filters() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Tasks::new(&store);
        let (admin, worker, other) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        repo.create(&request("team-a", worker, admin)).await.unwrap();
        repo.create(&request("team-a", other, admin)).await.unwrap();
        repo.create(&request("team-b", other, other)).await.unwrap();

        let team = repo
            .list(&TaskFilter {
                team_id: Some("team-a".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(team.len(), 2);
        assert!(team[0].id > team[1].id);

        let mine = repo
            .list(&TaskFilter {
                involving: Some(worker),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_delete_waits_for_a_running_update() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let task = Tasks::new(&store)
            .create(&request("t", Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let in_flight = store.lock(&keys::task(task.id)).await;
        let deleting = {
            let store = store.clone();
            tokio::spawn(async move { Tasks::new(&store).delete(task.id).await })
        };
        tokio::task::yield_now().await;
        assert!(Tasks::new(&store).get_by_id(task.id).await.unwrap().is_some());

        drop(in_flight);
        assert!(deleting.await.unwrap().unwrap());
        let update = Tasks::new(&store)
            .update(
                task.id,
                &TaskUpdateDBRequest {
                    title: Some("Too late".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(update, Err(DbError::NotFound)));
        assert!(Tasks::new(&store).get_by_id(task.id).await.unwrap().is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_update_keeps_feedback_unless_given() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Tasks::new(&store);
        let task = repo.create(&request("t", Uuid::new_v4(), Uuid::new_v4())).await.unwrap();

        let update = TaskUpdateDBRequest {
            status: Some(TaskStatus::InProgress),
            feedback: Some("Started".into()),
            ..Default::default()
        };
        repo.update(task.id, &update).await.unwrap();

        let update = TaskUpdateDBRequest {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        let done = repo.update(task.id, &update).await.unwrap();
        assert_eq!(done.feedback, "Started");
        assert!(done.completed_at.is_some());

        assert!(matches!(repo.update(999, &update).await, Err(DbError::NotFound)));
    }
}
