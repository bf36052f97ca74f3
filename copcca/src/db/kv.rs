//! Key-value document storage.
//!
//! Every entity is stored as a JSON document under a string key. Collections that belong to
//! one owner (a user's debt records, a team's SMS log) live in a single array document, so
//! mutations are read-modify-write; [`Store::lock`] serializes those per key.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{db::errors::Result, utils::arrays::safe_map};

/// A backend able to persist JSON documents by key.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Returns whether a document was removed
    async fn del(&self, key: &str) -> Result<bool>;

    /// Delete several keys, returning how many existed
    async fn mdel(&self, keys: &[String]) -> Result<u64>;

    /// All documents whose key starts with `prefix`, ordered by key
    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>>;
}

type LockMap = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Per-key async locks for read-modify-write sequences. An entry lives only while someone
/// holds or waits for its lock.
#[derive(Clone, Default)]
pub struct KeyLocks {
    locks: LockMap,
}

impl KeyLocks {
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        let mutex = self.locks.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        KeyGuard {
            guard: Some(mutex.lock_owned().await),
            key: key.to_string(),
            locks: self.locks.clone(),
        }
    }

    /// Keys with a live entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds a key's lock; releasing it drops the map entry once nobody else wants it.
pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: LockMap,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Holders and waiters each keep a clone, so only the map's own reference is left when idle
        self.locks.remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Shared handle to the configured backend, with typed JSON helpers.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn KvStore>,
    locks: KeyLocks,
}

impl Store {
    pub fn new(backend: Arc<dyn KvStore>) -> Self {
        Self {
            backend,
            locks: KeyLocks::default(),
        }
    }

    /// Hold this guard across a read-modify-write of `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        self.locks.acquire(key).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.backend.get(key).await
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.backend.set(key, value).await
    }

    pub async fn del(&self, key: &str) -> Result<bool> {
        self.backend.del(key).await
    }

    pub async fn mdel(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.backend.mdel(keys).await
    }

    pub async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>> {
        self.backend.get_by_prefix(prefix).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.backend.set(key, value).await
    }

    /// Read a list document. A missing key reads as empty and a lone object as a one-item list.
    pub async fn get_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let value = self.backend.get(key).await?.unwrap_or(Value::Null);
        let items = safe_map(value, serde_json::from_value::<T>);
        Ok(items.into_iter().collect::<std::result::Result<Vec<T>, _>>()?)
    }

    /// Values of every document under `prefix`, skipping ones that fail to decode.
    pub async fn values_by_prefix<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let rows = self.backend.get_by_prefix(prefix).await?;
        Ok(rows
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_value(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(key = %key, "Skipping undecodable document: {}", e);
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Note {
        text: String,
    }

    fn store() -> Store {
        Store::new(Arc::new(MemoryKv::default()))
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        let store = store();
        store.set_json("note:1", &Note { text: "hi".into() }).await.unwrap();

        let note: Option<Note> = store.get_json("note:1").await.unwrap();
        assert_eq!(note, Some(Note { text: "hi".into() }));

        let missing: Vec<Note> = store.get_list("notes:none").await.unwrap();
        assert!(missing.is_empty());

        store.set("notes:single", json!({"text": "solo"})).await.unwrap();
        let single: Vec<Note> = store.get_list("notes:single").await.unwrap();
        assert_eq!(single, vec![Note { text: "solo".into() }]);
    }

    #[tokio::test]
    async fn test_values_by_prefix_skips_bad_documents() {
        let store = store();
        store.set("note:1", json!({"text": "a"})).await.unwrap();
        store.set("note:2", json!(42)).await.unwrap();
        store.set("other:1", json!({"text": "c"})).await.unwrap();

        let notes: Vec<Note> = store.values_by_prefix("note:").await.unwrap();
        assert_eq!(notes, vec![Note { text: "a".into() }]);
    }

    #[tokio::test]
    async fn test_lock_serializes_updates() {
        let store = store();
        store.set_json("counter", &0u64).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let _guard = store.lock("counter").await;
                let current: u64 = store.get_json("counter").await.unwrap().unwrap_or(0);
                tokio::task::yield_now().await;
                store.set_json("counter", &(current + 1)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let total: u64 = store.get_json("counter").await.unwrap().unwrap();
        assert_eq!(total, 20);
    }

    #[tokio::test]
    async fn test_released_locks_are_forgotten() {
        let store = store();
        for i in 0..50 {
            let _guard = store.lock(&format!("reset:{i}")).await;
        }
        assert!(store.locks.is_empty());

        let held = store.lock("task:1").await;
        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                let _guard = store.lock("task:1").await;
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(store.locks.len(), 1);

        drop(held);
        waiter.await.unwrap();
        assert!(store.locks.is_empty());
    }
}
