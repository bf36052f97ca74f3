//! Repositories for team subscriptions and subscription payments.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::try_join_all;
use tracing::instrument;

use crate::{
    db::{
        Store,
        errors::{DbError, Result},
        handlers::repository::Repository,
        keys,
        models::subscriptions::{
            PaymentCreateDBRequest, PaymentDBResponse, PaymentFilter, PaymentStatus, SubscriptionDBResponse,
        },
    },
    types::now_ms,
};

pub struct Subscriptions<'a> {
    store: &'a Store,
}

impl<'a> Subscriptions<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub async fn get(&mut self, team_id: &str) -> Result<Option<SubscriptionDBResponse>> {
        self.store.get_json(&keys::subscription(team_id)).await
    }

    #[instrument(skip(self, subscription), fields(team_id = %subscription.team_id, status = ?subscription.status), err)]
    pub async fn save(&mut self, subscription: &SubscriptionDBResponse) -> Result<()> {
        self.store
            .set_json(&keys::subscription(&subscription.team_id), subscription)
            .await
    }

    /// Every team's subscription, newest first.
    #[instrument(skip(self), err)]
    pub async fn list_all(&mut self) -> Result<Vec<SubscriptionDBResponse>> {
        let mut all: Vec<SubscriptionDBResponse> = self.store.values_by_prefix(keys::SUBSCRIPTION_PREFIX).await?;
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

pub struct Payments<'a> {
    store: &'a Store,
}

impl<'a> Payments<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<'a> Repository for Payments<'a> {
    type CreateRequest = PaymentCreateDBRequest;
    type UpdateRequest = PaymentStatus;
    type Response = PaymentDBResponse;
    type Id = String;
    type Filter = PaymentFilter;

    /// Record a pending payment
    #[instrument(skip(self, request), fields(team_id = %request.team_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let payment = PaymentDBResponse {
            id: format!("pay-{}-{}", now_ms(), &uuid::Uuid::new_v4().simple().to_string()[..8]),
            team_id: request.team_id.clone(),
            plan: request.plan,
            amount: request.amount,
            currency: "TZS".to_string(),
            method: request.method.clone(),
            reference: request.reference.clone(),
            status: PaymentStatus::Pending,
            created_by: request.created_by,
            created_at: now,
            updated_at: now,
        };
        self.store.set_json(&keys::payment(&payment.id), &payment).await?;
        Ok(payment)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        self.store.get_json(&keys::payment(&id)).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let store = self.store;
        let found = try_join_all(ids.iter().map(|id| {
            let key = keys::payment(id);
            async move { store.get_json::<PaymentDBResponse>(&key).await }
        })).await?;
        Ok(found.into_iter().flatten().map(|p| (p.id.clone(), p)).collect())
    }

    /// Matching payments, newest first.
    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut payments: Vec<PaymentDBResponse> = self
            .store
            .values_by_prefix::<PaymentDBResponse>(keys::PAYMENT_PREFIX)
            .await?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        self.store.del(&keys::payment(&id)).await
    }

    #[instrument(skip(self), err)]
    async fn update(&mut self, id: Self::Id, status: &Self::UpdateRequest) -> Result<Self::Response> {
        let key = keys::payment(&id);
        let _guard = self.store.lock(&key).await;
        let mut payment: PaymentDBResponse = self.store.get_json(&key).await?.ok_or(DbError::NotFound)?;
        payment.status = *status;
        payment.updated_at = Utc::now();
        self.store.set_json(&key, &payment).await?;
        Ok(payment)
    }
}
