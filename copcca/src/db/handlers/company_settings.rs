//! Repository for per-team company settings.

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::instrument;

use crate::{
    db::{Store, errors::Result, keys, models::company::default_company_settings},
    types::UserId,
};

pub struct CompanySettings<'a> {
    store: &'a Store,
}

impl<'a> CompanySettings<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Stored settings, or the defaults for a team that never saved any.
    pub async fn get(&mut self, team_id: &str) -> Result<Map<String, Value>> {
        Ok(self
            .store
            .get_json(&keys::company_settings(team_id))
            .await?
            .unwrap_or_else(default_company_settings))
    }

    /// Shallow-merge `updates` over the stored settings.
    #[instrument(skip(self, updates), err)]
    pub async fn merge(
        &mut self,
        team_id: &str,
        updates: &Map<String, Value>,
        updated_by: &UserId,
    ) -> Result<Map<String, Value>> {
        let key = keys::company_settings(team_id);
        let _guard = self.store.lock(&key).await;
        let mut settings: Map<String, Value> = self.store.get_json(&key).await?.unwrap_or_default();

        settings.extend(updates.clone());
        settings.insert("updatedAt".into(), json!(Utc::now()));
        settings.insert("updatedBy".into(), json!(updated_by));

        self.store.set_json(&key, &settings).await?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_defaults_then_merge() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = CompanySettings::new(&store);

        let defaults = repo.get("team-1").await.unwrap();
        assert_eq!(defaults["companyName"], "");
        assert_eq!(defaults["showCompanyName"], true);

        let mut updates = Map::new();
        updates.insert("companyName".into(), json!("Mama Lishe Foods"));
        let admin = Uuid::new_v4();
        let saved = repo.merge("team-1", &updates, &admin).await.unwrap();
        assert_eq!(saved["companyName"], "Mama Lishe Foods");
        assert_eq!(saved["updatedBy"], json!(admin));

        assert_eq!(repo.get("team-1").await.unwrap()["companyName"], "Mama Lishe Foods");
        assert_eq!(repo.get("team-2").await.unwrap()["companyName"], "");
    }
}
