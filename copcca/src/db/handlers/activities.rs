//! Repository for the per-user activity feed.

use chrono::Utc;
use tracing::{instrument, warn};

use crate::{
    db::{
        Store,
        errors::Result,
        keys,
        models::activities::{ActivityCreateDBRequest, ActivityDBResponse, MAX_ACTIVITIES},
    },
    types::{UserId, now_ms},
};

pub struct Activities<'a> {
    store: &'a Store,
}

impl<'a> Activities<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Prepend an entry, keeping the newest [`MAX_ACTIVITIES`].
    #[instrument(skip(self, request), fields(category = %request.category), err)]
    pub async fn create(&mut self, user_id: &UserId, request: &ActivityCreateDBRequest) -> Result<ActivityDBResponse> {
        let key = keys::activities(user_id);
        let _guard = self.store.lock(&key).await;
        let mut entries: Vec<ActivityDBResponse> = self.store.get_list(&key).await?;

        let last = entries.iter().map(|a| a.id).max().unwrap_or(0);
        let activity = ActivityDBResponse {
            id: now_ms().max(last + 1),
            time: Utc::now(),
            category: request.category.clone(),
            action: request.action.clone(),
            details: request.details.clone(),
            priority: request.priority,
            user_id: *user_id,
        };

        entries.insert(0, activity.clone());
        entries.truncate(MAX_ACTIVITIES);
        self.store.set_json(&key, &entries).await?;
        Ok(activity)
    }

    /// Record an activity; failures are logged and otherwise ignored.
    pub async fn log(&mut self, user_id: &UserId, request: ActivityCreateDBRequest) {
        if let Err(e) = self.create(user_id, &request).await {
            warn!(%user_id, action = %request.action, "Failed to log activity: {}", e);
        }
    }

    /// Newest first, at most `limit`.
    #[instrument(skip(self), err)]
    pub async fn list(&mut self, user_id: &UserId, limit: usize) -> Result<Vec<ActivityDBResponse>> {
        let mut entries: Vec<ActivityDBResponse> = self.store.get_list(&keys::activities(user_id)).await?;
        entries.sort_by(|a, b| b.time.cmp(&a.time));
        entries.truncate(limit);
        Ok(entries)
    }

    pub async fn delete_all(&mut self, user_id: &UserId) -> Result<bool> {
        self.store.del(&keys::activities(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use crate::db::models::activities::Priority;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_feed_is_newest_first_and_capped() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Activities::new(&store);
        let user = Uuid::new_v4();

        for i in 0..(MAX_ACTIVITIES + 10) {
            repo.log(
                &user,
                ActivityCreateDBRequest::new("KPI Tracking", "Added KPI metric", format!("m{i}"), Priority::Low),
            )
            .await;
        }

        let all = repo.list(&user, usize::MAX).await.unwrap();
        assert_eq!(all.len(), MAX_ACTIVITIES);
        assert_eq!(all[0].details, format!("m{}", MAX_ACTIVITIES + 9));
        assert!(all.windows(2).all(|w| w[0].id > w[1].id));

        assert_eq!(repo.list(&user, 50).await.unwrap().len(), 50);

        assert!(repo.delete_all(&user).await.unwrap());
        assert!(repo.list(&user, 50).await.unwrap().is_empty());
    }
}
