//! Repository for a user's third-party integrations.

use chrono::Utc;
use serde_json::{Value, json};
use tracing::instrument;

use crate::{
    db::{
        Store,
        errors::{DbError, Result},
        keys,
        models::integrations::{Integration, integration_id},
    },
    types::{UserId, now_ms},
};

pub struct Integrations<'a> {
    store: &'a Store,
}

impl<'a> Integrations<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub async fn list(&mut self, owner: &UserId) -> Result<Vec<Integration>> {
        self.store.get_list(&keys::integrations(owner)).await
    }

    /// Add an integration. A client-supplied string `id` is kept, otherwise `int-{ms}`.
    #[instrument(skip(self, integration), err)]
    pub async fn create(&mut self, owner: &UserId, mut integration: Integration) -> Result<Integration> {
        let key = keys::integrations(owner);
        let _guard = self.store.lock(&key).await;
        let mut all: Vec<Integration> = self.store.get_list(&key).await?;

        let id = match integration_id(&integration) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("int-{}", now_ms()),
        };
        if all.iter().any(|i| integration_id(i) == Some(id.as_str())) {
            return Err(DbError::UniqueViolation {
                key: "integration".to_string(),
                conflicting_value: Some(id),
            });
        }

        let now = json!(Utc::now());
        integration.insert("id".into(), Value::String(id));
        integration.insert("createdAt".into(), now.clone());
        integration.insert("updatedAt".into(), now);

        all.push(integration.clone());
        self.store.set_json(&key, &all).await?;
        Ok(integration)
    }

    /// Apply `change` to one integration under the list lock.
    async fn modify<F>(&mut self, owner: &UserId, id: &str, change: F) -> Result<Integration>
    where
        F: FnOnce(&mut Integration),
    {
        let key = keys::integrations(owner);
        let _guard = self.store.lock(&key).await;
        let mut all: Vec<Integration> = self.store.get_list(&key).await?;

        let integration = all
            .iter_mut()
            .find(|i| integration_id(i) == Some(id))
            .ok_or(DbError::NotFound)?;
        change(&mut *integration);
        integration.insert("id".into(), Value::String(id.to_string()));
        integration.insert("updatedAt".into(), json!(Utc::now()));
        let updated = integration.clone();

        self.store.set_json(&key, &all).await?;
        Ok(updated)
    }

    #[instrument(skip(self, updates), err)]
    pub async fn update(&mut self, owner: &UserId, id: &str, updates: &Integration) -> Result<Integration> {
        self.modify(owner, id, |i| {
            for (k, v) in updates {
                if k != "createdAt" {
                    i.insert(k.clone(), v.clone());
                }
            }
        })
        .await
    }

    /// Stamp `lastSync` and mark the integration connected.
    #[instrument(skip(self), err)]
    pub async fn sync(&mut self, owner: &UserId, id: &str) -> Result<Integration> {
        self.modify(owner, id, |i| {
            i.insert("lastSync".into(), json!(Utc::now()));
            i.insert("status".into(), json!("connected"));
        })
        .await
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&mut self, owner: &UserId, id: &str) -> Result<Integration> {
        let key = keys::integrations(owner);
        let _guard = self.store.lock(&key).await;
        let mut all: Vec<Integration> = self.store.get_list(&key).await?;

        let index = all
            .iter()
            .position(|i| integration_id(i) == Some(id))
            .ok_or(DbError::NotFound)?;
        let removed = all.remove(index);

        self.store.set_json(&key, &all).await?;
        Ok(removed)
    }

    pub async fn delete_all(&mut self, owner: &UserId) -> Result<bool> {
        self.store.del(&keys::integrations(owner)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use std::sync::Arc;
    use uuid::Uuid;

    fn obj(value: Value) -> Integration {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Integrations::new(&store);
        let owner = Uuid::new_v4();

        let created = repo
            .create(&owner, obj(json!({ "name": "QuickBooks", "status": "pending" })))
            .await
            .unwrap();
        let id = integration_id(&created).unwrap().to_string();
        assert!(id.starts_with("int-"));

        let synced = repo.sync(&owner, &id).await.unwrap();
        assert_eq!(synced["status"], "connected");
        assert!(synced.contains_key("lastSync"));

        let renamed = repo
            .update(&owner, &id, &obj(json!({ "name": "QuickBooks Online", "id": "hijack" })))
            .await
            .unwrap();
        assert_eq!(renamed["name"], "QuickBooks Online");
        assert_eq!(integration_id(&renamed), Some(id.as_str()));

        repo.delete(&owner, &id).await.unwrap();
        assert!(matches!(repo.delete(&owner, &id).await, Err(DbError::NotFound)));
        assert!(repo.list(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_client_ids_are_kept_and_unique() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Integrations::new(&store);
        let owner = Uuid::new_v4();

        let created = repo.create(&owner, obj(json!({ "id": "mpesa", "name": "M-Pesa" }))).await.unwrap();
        assert_eq!(integration_id(&created), Some("mpesa"));

        let dup = repo.create(&owner, obj(json!({ "id": "mpesa" }))).await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));
    }
}
