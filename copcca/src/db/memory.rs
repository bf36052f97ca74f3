//! In-process storage backend for development and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::db::{errors::Result, kv::KvStore};

#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: DashMap<String, Value>,
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn mdel(&self, keys: &[String]) -> Result<u64> {
        Ok(keys.iter().filter(|key| self.entries.remove(key.as_str()).is_some()).count() as u64)
    }

    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>> {
        let mut rows: Vec<(String, Value)> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_crud() {
        let kv = MemoryKv::default();
        kv.set("a", json!(1)).await.unwrap();
        kv.set("b", json!(2)).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), Some(json!(1)));

        assert!(kv.del("a").await.unwrap());
        assert!(!kv.del("a").await.unwrap());

        let removed = kv.mdel(&["b".to_string(), "c".to_string()]).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(kv.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prefix_scan_is_ordered() {
        let kv = MemoryKv::default();
        kv.set("user:b", json!("b")).await.unwrap();
        kv.set("user:a", json!("a")).await.unwrap();
        kv.set("team:a", json!("t")).await.unwrap();

        let rows = kv.get_by_prefix("user:").await.unwrap();
        let keys: Vec<_> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["user:a", "user:b"]);
    }
}
