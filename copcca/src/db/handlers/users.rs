//! Repository for user profiles and teams.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::try_join_all;
use serde_json::json;
use tracing::instrument;

use crate::{
    db::{
        Store,
        errors::{DbError, Result},
        handlers::repository::Repository,
        keys,
        models::users::{TeamDBResponse, UserCreateDBRequest, UserDBResponse, UserFilter, UserUpdateDBRequest},
    },
    types::{TeamId, UserId, abbrev_uuid},
};

pub struct Users<'a> {
    store: &'a Store,
}

impl<'a> Users<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let Some(id) = self.store.get_json::<UserId>(&keys::user_email(email)).await? else {
            return Ok(None);
        };
        self.get_by_id(id).await
    }

    /// Whether an account with this email (case-insensitive) exists.
    pub async fn email_taken(&mut self, email: &str) -> Result<bool> {
        Ok(self.store.get(&keys::user_email(email)).await?.is_some())
    }
}

#[async_trait::async_trait]
impl<'a> Repository for Users<'a> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let email_key = keys::user_email(&request.email);
        let _guard = self.store.lock(&email_key).await;

        if self.store.get(&email_key).await?.is_some() {
            return Err(DbError::UniqueViolation {
                key: "email".to_string(),
                conflicting_value: Some(request.email.clone()),
            });
        }

        let now = Utc::now();
        let user = UserDBResponse {
            id: request.id,
            name: request.name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            company: request.company.clone(),
            role: request.role,
            team_id: request.team_id.clone(),
            status: "Active".to_string(),
            password_hash: request.password_hash.clone(),
            created_at: now,
            updated_at: now,
            extra: Default::default(),
        };

        self.store.set_json(&keys::user(&user.id), &user).await?;
        self.store.set(&email_key, json!(user.id)).await?;
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        self.store.get_json(&keys::user(&id)).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let store = self.store;
        let found = try_join_all(ids.iter().map(|id| {
            let key = keys::user(id);
            async move { store.get_json::<UserDBResponse>(&key).await }
        })).await?;
        Ok(found.into_iter().flatten().map(|u| (u.id, u)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut users: Vec<UserDBResponse> = self
            .store
            .values_by_prefix::<UserDBResponse>(keys::USER_PREFIX)
            .await?
            .into_iter()
            .filter(|u| filter.matches(u))
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let Some(user) = self.get_by_id(id).await? else {
            return Ok(false);
        };

        self.store.mdel(&[keys::user(&id), keys::user_email(&user.email)]).await?;
        Teams::new(self.store).remove_member(&user.team_id, &id).await?;
        Ok(true)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let key = keys::user(&id);
        let _guard = self.store.lock(&key).await;

        let mut user: UserDBResponse = self.store.get_json(&key).await?.ok_or(DbError::NotFound)?;

        if let Some(name) = &request.name {
            user.name = name.clone();
        }
        if let Some(phone) = &request.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(company) = &request.company {
            user.company = Some(company.clone());
        }
        if let Some(role) = request.role {
            user.role = role;
        }
        if let Some(hash) = &request.password_hash {
            user.password_hash = hash.clone();
        }
        user.extra.extend(request.extra.clone());
        user.updated_at = Utc::now();

        self.store.set_json(&key, &user).await?;
        Ok(user)
    }
}

/// Team documents: name, admin and member list.
pub struct Teams<'a> {
    store: &'a Store,
}

impl<'a> Teams<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, name), err)]
    pub async fn create(&mut self, team_id: &TeamId, name: &str, admin_id: UserId) -> Result<TeamDBResponse> {
        let team = TeamDBResponse {
            id: team_id.clone(),
            name: name.to_string(),
            admin_id,
            members: vec![admin_id],
            created_at: Utc::now(),
        };
        self.store.set_json(&keys::team(team_id), &team).await?;
        Ok(team)
    }

    pub async fn get(&mut self, team_id: &str) -> Result<Option<TeamDBResponse>> {
        self.store.get_json(&keys::team(team_id)).await
    }

    /// Add a member; a missing team document is left alone.
    #[instrument(skip(self), err)]
    pub async fn add_member(&mut self, team_id: &str, user_id: UserId) -> Result<()> {
        let key = keys::team(team_id);
        let _guard = self.store.lock(&key).await;
        if let Some(mut team) = self.store.get_json::<TeamDBResponse>(&key).await?
            && !team.members.contains(&user_id)
        {
            team.members.push(user_id);
            self.store.set_json(&key, &team).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn remove_member(&mut self, team_id: &str, user_id: &UserId) -> Result<()> {
        let key = keys::team(team_id);
        let _guard = self.store.lock(&key).await;
        if let Some(mut team) = self.store.get_json::<TeamDBResponse>(&key).await? {
            team.members.retain(|m| m != user_id);
            self.store.set_json(&key, &team).await?;
        }
        Ok(())
    }
}
