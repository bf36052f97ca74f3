//! Repository for per-user record collections.

use chrono::Utc;
use serde_json::{Value, json};
use tracing::instrument;

use crate::{
    db::{
        Store,
        errors::{DbError, Result},
        keys,
        models::records::{Collection, Record, record_id},
    },
    types::{UserId, now_ms},
};

/// Fields the server owns on every record
const SERVER_FIELDS: &[&str] = &["id", "createdAt", "updatedAt"];

pub struct Records<'a> {
    store: &'a Store,
}

impl<'a> Records<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self, collection: Collection, owner: &UserId) -> Result<Vec<Record>> {
        self.store.get_list(&keys::records(collection.as_str(), owner)).await
    }

    /// Append a record. Ids are epoch milliseconds, bumped past the last id when two records
    /// land in the same millisecond.
    #[instrument(skip(self, record), err)]
    pub async fn create(&mut self, collection: Collection, owner: &UserId, mut record: Record) -> Result<Record> {
        let key = keys::records(collection.as_str(), owner);
        let _guard = self.store.lock(&key).await;
        let mut records: Vec<Record> = self.store.get_list(&key).await?;

        let last = records.iter().filter_map(record_id).max().unwrap_or(0);
        let id = now_ms().max(last + 1);
        let now = json!(Utc::now());

        record.insert("id".into(), json!(id));
        record.insert("createdAt".into(), now.clone());
        record.insert("updatedAt".into(), now);

        records.push(record.clone());
        self.store.set_json(&key, &records).await?;
        Ok(record)
    }

    /// Merge `updates` into a record. Returns the merged record.
    #[instrument(skip(self, updates), err)]
    pub async fn update(
        &mut self,
        collection: Collection,
        owner: &UserId,
        id: i64,
        updates: &Record,
    ) -> Result<Record> {
        let key = keys::records(collection.as_str(), owner);
        let _guard = self.store.lock(&key).await;
        let mut records: Vec<Record> = self.store.get_list(&key).await?;

        let record = records
            .iter_mut()
            .find(|r| record_id(r) == Some(id))
            .ok_or(DbError::NotFound)?;

        for (k, v) in updates {
            if !SERVER_FIELDS.contains(&k.as_str()) {
                record.insert(k.clone(), v.clone());
            }
        }
        record.insert("updatedAt".into(), json!(Utc::now()));
        let merged = record.clone();

        self.store.set_json(&key, &records).await?;
        Ok(merged)
    }

    /// Remove a record, returning it.
    #[instrument(skip(self), err)]
    pub async fn delete(&mut self, collection: Collection, owner: &UserId, id: i64) -> Result<Record> {
        let key = keys::records(collection.as_str(), owner);
        let _guard = self.store.lock(&key).await;
        let mut records: Vec<Record> = self.store.get_list(&key).await?;

        let index = records
            .iter()
            .position(|r| record_id(r) == Some(id))
            .ok_or(DbError::NotFound)?;
        let removed = records.remove(index);

        self.store.set_json(&key, &records).await?;
        Ok(removed)
    }

    /// Drop every collection owned by a user.
    #[instrument(skip(self), err)]
    pub async fn delete_all(&mut self, owner: &UserId) -> Result<u64> {
        let keys: Vec<String> = Collection::ALL
            .iter()
            .map(|c| keys::records(c.as_str(), owner))
            .collect();
        self.store.mdel(&keys).await
    }
}

/// Tag a record with the identity of its owner, for merged team views.
pub fn annotate_owner(mut record: Record, user_id: &UserId, name: Option<&str>, email: Option<&str>) -> Record {
    record.insert("_userId".into(), json!(user_id));
    if let Some(name) = name {
        record.insert("_userName".into(), Value::String(name.to_string()));
    }
    if let Some(email) = email {
        record.insert("_userEmail".into(), Value::String(email.to_string()));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use std::sync::Arc;
    use uuid::Uuid;

    fn obj(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn test_ids_are_strictly_increasing() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Records::new(&store);
        let owner = Uuid::new_v4();

        let mut last = 0;
        for i in 0..20 {
            let record = repo
                .create(Collection::Debt, &owner, obj(json!({ "customer": format!("c{i}") })))
                .await
                .unwrap();
            let id = record_id(&record).unwrap();
            assert!(id > last);
            last = id;
        }
        assert_eq!(repo.list(Collection::Debt, &owner).await.unwrap().len(), 20);
        assert!(repo.list(Collection::Kpi, &owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_but_keeps_id() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Records::new(&store);
        let owner = Uuid::new_v4();

        let created = repo
            .create(Collection::Aftersales, &owner, obj(json!({ "customer": "Amina", "rating": 4 })))
            .await
            .unwrap();
        let id = record_id(&created).unwrap();

        let updated = repo
            .update(Collection::Aftersales, &owner, id, &obj(json!({ "id": 1, "rating": 5 })))
            .await
            .unwrap();
        assert_eq!(record_id(&updated), Some(id));
        assert_eq!(updated["customer"], "Amina");
        assert_eq!(updated["rating"], 5);
        assert_eq!(updated["createdAt"], created["createdAt"]);

        let missing = repo.update(Collection::Aftersales, &owner, id + 1, &Record::new()).await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Records::new(&store);
        let owner = Uuid::new_v4();

        let a = repo.create(Collection::Kpi, &owner, obj(json!({ "name": "MRR" }))).await.unwrap();
        repo.create(Collection::Sales, &owner, obj(json!({ "title": "Q3" }))).await.unwrap();

        let removed = repo.delete(Collection::Kpi, &owner, record_id(&a).unwrap()).await.unwrap();
        assert_eq!(removed["name"], "MRR");
        assert!(matches!(
            repo.delete(Collection::Kpi, &owner, record_id(&a).unwrap()).await,
            Err(DbError::NotFound)
        ));

        repo.delete_all(&owner).await.unwrap();
        assert!(repo.list(Collection::Sales, &owner).await.unwrap().is_empty());
    }

    #[test]
    fn test_annotate_owner() {
        let owner = Uuid::new_v4();
        let record = annotate_owner(obj(json!({ "id": 1 })), &owner, Some("Baraka"), None);
        assert_eq!(record["_userId"], json!(owner));
        assert_eq!(record["_userName"], "Baraka");
        assert!(!record.contains_key("_userEmail"));
    }
}
