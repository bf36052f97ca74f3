//! Repository for invitation codes.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::try_join_all;
use tracing::instrument;

use crate::db::{
    Store,
    errors::{DbError, Result},
    handlers::repository::Repository,
    keys,
    models::invitations::{
        InvitationCreateDBRequest, InvitationDBResponse, InvitationUpdateDBRequest, generate_invite_code,
    },
};

/// Filter for listing invitations
#[derive(Debug, Clone, Default)]
pub struct InvitationFilter {
    pub team_id: Option<String>,
    pub include_used: bool,
}

pub struct Invitations<'a> {
    store: &'a Store,
}

impl<'a> Invitations<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<'a> Repository for Invitations<'a> {
    type CreateRequest = InvitationCreateDBRequest;
    type UpdateRequest = InvitationUpdateDBRequest;
    type Response = InvitationDBResponse;
    type Id = String;
    type Filter = InvitationFilter;

    #[instrument(skip(self, request), fields(team_id = %request.team_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let invitation = InvitationDBResponse {
            code: generate_invite_code(),
            email: request.email.clone().unwrap_or_default(),
            phone: request.phone.clone().unwrap_or_default(),
            name: request.name.clone(),
            role: request.role,
            created_by: request.created_by,
            team_id: request.team_id.clone(),
            created_at: Utc::now(),
            expires_at: request.expires_at,
            used: false,
            used_by: None,
            used_at: None,
        };
        self.store.set_json(&keys::invite(&invitation.code), &invitation).await?;
        Ok(invitation)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, code: Self::Id) -> Result<Option<Self::Response>> {
        self.store.get_json(&keys::invite(&code)).await
    }

    #[instrument(skip(self, codes), fields(count = codes.len()), err)]
    async fn get_bulk(&mut self, codes: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let store = self.store;
        let found = try_join_all(codes.iter().map(|c| {
            let key = keys::invite(c);
            async move { store.get_json::<InvitationDBResponse>(&key).await }
        })).await?;
        Ok(found.into_iter().flatten().map(|i| (i.code.clone(), i)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut invitations: Vec<InvitationDBResponse> = self
            .store
            .values_by_prefix::<InvitationDBResponse>("invite:")
            .await?
            .into_iter()
            .filter(|i| filter.team_id.as_ref().is_none_or(|t| &i.team_id == t))
            .filter(|i| filter.include_used || !i.used)
            .collect();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, code: Self::Id) -> Result<bool> {
        self.store.del(&keys::invite(&code)).await
    }

    /// Mark the invitation redeemed. A second redemption is a conflict.
    #[instrument(skip(self, request), err)]
    async fn update(&mut self, code: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let key = keys::invite(&code);
        let _guard = self.store.lock(&key).await;
        let mut invitation: InvitationDBResponse = self.store.get_json(&key).await?.ok_or(DbError::NotFound)?;

        if invitation.used {
            return Err(DbError::UniqueViolation {
                key: "invitation".to_string(),
                conflicting_value: None,
            });
        }
        invitation.used = true;
        invitation.used_by = Some(request.used_by);
        invitation.used_at = Some(Utc::now());

        self.store.set_json(&key, &invitation).await?;
        Ok(invitation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use crate::db::models::invitations::InvitationProblem;
    use crate::types::Role;
    use chrono::Duration;
    use std::sync::Arc;
    use uuid::Uuid;

    fn request(expires_in: Duration) -> InvitationCreateDBRequest {
        InvitationCreateDBRequest {
            email: Some("new@example.com".into()),
            phone: None,
            name: Some("Rehema".into()),
            role: Role::User,
            created_by: Uuid::new_v4(),
            team_id: "team-1".into(),
            expires_at: Utc::now() + expires_in,
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_redeem_once() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Invitations::new(&store);
        let invite = repo.create(&request(Duration::days(7))).await.unwrap();
        assert!(invite.check_redeemable(Utc::now()).is_ok());

        let redeemer = Uuid::new_v4();
        let used = repo
            .update(invite.code.clone(), &InvitationUpdateDBRequest { used_by: redeemer })
            .await
            .unwrap();
        assert_eq!(used.used_by, Some(redeemer));
        assert_eq!(used.check_redeemable(Utc::now()), Err(InvitationProblem::Used));

        let again = repo
            .update(invite.code.clone(), &InvitationUpdateDBRequest { used_by: redeemer })
            .await;
        assert!(matches!(again, Err(DbError::UniqueViolation { .. })));

        let open = repo.list(&InvitationFilter::default()).await.unwrap();
        assert!(open.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_expired_invites() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Invitations::new(&store);
        let invite = repo.create(&request(-Duration::hours(1))).await.unwrap();
        assert_eq!(invite.check_redeemable(Utc::now()), Err(InvitationProblem::Expired));
    }
}
