//! Repository for password reset tokens.

use std::collections::HashMap;

use chrono::Utc;
use tracing::instrument;

use crate::{
    db::{
        Store,
        errors::{DbError, Result},
        handlers::repository::Repository,
        keys,
        models::password_reset_tokens::{PasswordResetTokenCreateDBRequest, PasswordResetTokenDBResponse},
    },
    security::fingerprint::hash_token,
};

/// Tokens are looked up by their raw value and stored under its hash.
fn token_key(raw_token: &str) -> String {
    keys::reset_token(&hash_token(raw_token))
}

/// Marks a token used
#[derive(Debug, Clone, Copy)]
pub struct PasswordResetTokenUse;

pub struct PasswordResetTokens<'a> {
    store: &'a Store,
}

impl<'a> PasswordResetTokens<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<'a> Repository for PasswordResetTokens<'a> {
    type CreateRequest = PasswordResetTokenCreateDBRequest;
    type UpdateRequest = PasswordResetTokenUse;
    type Response = PasswordResetTokenDBResponse;
    /// The raw token
    type Id = String;
    type Filter = ();

    #[instrument(skip(self, request), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let token = PasswordResetTokenDBResponse {
            user_id: request.user_id,
            email: request.email.clone(),
            created_at: Utc::now(),
            expires_at: request.expires_at,
            used: false,
            used_at: None,
        };
        self.store.set_json(&token_key(&request.raw_token), &token).await?;
        Ok(token)
    }

    #[instrument(skip_all, err)]
    async fn get_by_id(&mut self, raw_token: Self::Id) -> Result<Option<Self::Response>> {
        self.store.get_json(&token_key(&raw_token)).await
    }

    #[instrument(skip_all, err)]
    async fn get_bulk(&mut self, raw_tokens: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let mut found = HashMap::new();
        for raw in raw_tokens {
            if let Some(token) = self.get_by_id(raw.clone()).await? {
                found.insert(raw, token);
            }
        }
        Ok(found)
    }

    /// Tokens are not enumerable by raw value, so listing is always empty.
    async fn list(&mut self, _filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        Ok(Vec::new())
    }

    #[instrument(skip_all, err)]
    async fn delete(&mut self, raw_token: Self::Id) -> Result<bool> {
        self.store.del(&token_key(&raw_token)).await
    }

    #[instrument(skip_all, err)]
    async fn update(&mut self, raw_token: Self::Id, _request: &Self::UpdateRequest) -> Result<Self::Response> {
        let key = token_key(&raw_token);
        let _guard = self.store.lock(&key).await;
        let mut token: PasswordResetTokenDBResponse = self.store.get_json(&key).await?.ok_or(DbError::NotFound)?;

        token.used = true;
        token.used_at = Some(Utc::now());
        self.store.set_json(&key, &token).await?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::generate_reset_token;
    use crate::db::memory::MemoryKv;
    use chrono::Duration;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_tokens_are_stored_hashed() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = PasswordResetTokens::new(&store);
        let raw = generate_reset_token();

        repo.create(&PasswordResetTokenCreateDBRequest {
            user_id: Uuid::new_v4(),
            email: "reset@example.com".into(),
            raw_token: raw.clone(),
            expires_at: Utc::now() + Duration::hours(1),
        })
        .await
        .unwrap();

        assert!(store.get(&keys::reset_token(&raw)).await.unwrap().is_none());
        let token = repo.get_by_id(raw.clone()).await.unwrap().unwrap();
        assert!(!token.used);

        let used = repo.update(raw.clone(), &PasswordResetTokenUse).await.unwrap();
        assert!(used.used && used.used_at.is_some());

        assert!(repo.delete(raw.clone()).await.unwrap());
        assert!(repo.get_by_id(raw).await.unwrap().is_none());
    }
}
