//! Subscription plans, team subscriptions and payments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

use crate::types::{TeamId, UserId};

/// Feature flag granting every feature
pub const ALL_FEATURES: &str = "all_features";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlanName {
    Start,
    Grow,
    Pro,
    Enterprise,
}

impl PlanName {
    pub const ALL: [PlanName; 4] = [PlanName::Start, PlanName::Grow, PlanName::Pro, PlanName::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanName::Start => "start",
            PlanName::Grow => "grow",
            PlanName::Pro => "pro",
            PlanName::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for PlanName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlanName::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown plan '{s}'"))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub name: PlanName,
    pub display_name: String,
    /// Monthly price in TZS; `None` for custom pricing
    pub price_tzs: Option<i64>,
    pub currency: String,
    /// -1 means unlimited
    pub max_users: i64,
    pub features: Vec<String>,
}

impl SubscriptionPlan {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| *f == ALL_FEATURES || *f == feature)
    }

    pub fn allows_users(&self, count: usize) -> bool {
        self.max_users < 0 || (count as i64) <= self.max_users
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Trial,
    Active,
    PastDue,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDBResponse {
    pub team_id: TeamId,
    pub plan: PlanName,
    pub status: SubscriptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_period_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDBResponse {
    pub id: String,
    pub team_id: TeamId,
    pub plan: PlanName,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub status: PaymentStatus,
    #[schema(value_type = String, format = "uuid")]
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PaymentCreateDBRequest {
    pub team_id: TeamId,
    pub plan: PlanName,
    pub amount: Decimal,
    pub method: String,
    pub reference: Option<String>,
    pub created_by: UserId,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub team_id: Option<TeamId>,
    pub status: Option<PaymentStatus>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &PaymentDBResponse) -> bool {
        self.team_id.as_ref().is_none_or(|t| &payment.team_id == t) && self.status.is_none_or(|s| payment.status == s)
    }
}
