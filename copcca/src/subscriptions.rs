//! Subscription plans, trials and feature gating for teams.
//!
//! Each team has at most one subscription. Signing up without an invitation starts a trial on
//! the `start` plan; a trial that runs out is moved to `past_due` the next time it is read, and a
//! completed payment activates the paid plan for one billing period.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    config::SubscriptionsConfig,
    db::{
        Store,
        handlers::Subscriptions,
        models::subscriptions::{ALL_FEATURES, PlanName, SubscriptionDBResponse, SubscriptionPlan, SubscriptionStatus},
    },
    errors::Result,
};

const START_FEATURES: &[&str] = &[
    "customer_management",
    "invoicing",
    "after_sales",
    "debt_collection",
    "pos_system",
];
const GROW_FEATURES: &[&str] = &[
    "kpi_dashboard",
    "competitor_analysis",
    "marketing_campaigns",
    "sms_automation",
    "team_management",
];
const PRO_FEATURES: &[&str] = &["reports_advanced", "integrations", "api_access"];

pub fn plan(name: PlanName) -> SubscriptionPlan {
    let (display_name, price_tzs, max_users, tiers): (&str, Option<i64>, i64, &[&[&str]]) = match name {
        PlanName::Start => ("Start", Some(25_000), 1, &[START_FEATURES]),
        PlanName::Grow => ("Grow", Some(80_000), 3, &[START_FEATURES, GROW_FEATURES]),
        PlanName::Pro => ("Pro", Some(120_000), 10, &[START_FEATURES, GROW_FEATURES, PRO_FEATURES]),
        PlanName::Enterprise => ("Enterprise", None, -1, &[&[ALL_FEATURES]]),
    };
    SubscriptionPlan {
        name,
        display_name: display_name.to_string(),
        price_tzs,
        currency: "TZS".to_string(),
        max_users,
        features: tiers.iter().flat_map(|t| t.iter()).map(|f| f.to_string()).collect(),
    }
}

pub fn plans() -> Vec<SubscriptionPlan> {
    PlanName::ALL.into_iter().map(plan).collect()
}

/// Feature a page module needs. Unmapped modules are open to every plan.
pub fn module_feature(module: &str) -> Option<&'static str> {
    Some(match module {
        "sales-hub" => "pos_system",
        "marketing" => "marketing_campaigns",
        "analytics" => "kpi_dashboard",
        "debt-collection" => "debt_collection",
        "reports" => "reports_advanced",
        "after-sales" => "after_sales",
        "competitors" => "competitor_analysis",
        "customers" => "customer_management",
        "invoices" => "invoicing",
        "sms" => "sms_automation",
        "integrations" => "integrations",
        "team" => "team_management",
        _ => return None,
    })
}

/// Whole days left on the trial or the paid period, rounded up and never negative.
pub fn days_left(subscription: &SubscriptionDBResponse, now: DateTime<Utc>) -> i64 {
    let end = match subscription.status {
        SubscriptionStatus::Trial => subscription.trial_end_date,
        SubscriptionStatus::Active => subscription.current_period_end,
        _ => None,
    };
    let Some(end) = end else { return 0 };

    let remaining_ms = (end - now).num_milliseconds();
    if remaining_ms <= 0 {
        return 0;
    }
    (remaining_ms + 86_400_000 - 1) / 86_400_000
}

/// Whether the subscription currently grants `feature`.
pub fn has_feature_access(subscription: Option<&SubscriptionDBResponse>, feature: &str, now: DateTime<Utc>) -> bool {
    let Some(subscription) = subscription else {
        return false;
    };
    let usable = match subscription.status {
        SubscriptionStatus::Trial => true,
        SubscriptionStatus::Active => subscription.current_period_end.is_some_and(|end| end > now),
        SubscriptionStatus::PastDue | SubscriptionStatus::Expired | SubscriptionStatus::Cancelled => false,
    };
    usable && plan(subscription.plan).has_feature(feature)
}

pub fn has_module_access(subscription: Option<&SubscriptionDBResponse>, module: &str, now: DateTime<Utc>) -> bool {
    match module_feature(module) {
        Some(feature) => has_feature_access(subscription, feature, now),
        None => true,
    }
}

/// Subscription summary shown to the team.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub subscription: Option<SubscriptionDBResponse>,
    pub plan: Option<SubscriptionPlan>,
    pub days_left: i64,
    pub is_trial: bool,
    pub can_access_features: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SubscriptionSummary {
    pub fn new(subscription: Option<SubscriptionDBResponse>, now: DateTime<Utc>) -> Self {
        let Some(sub) = subscription else {
            return Self {
                subscription: None,
                plan: None,
                days_left: 0,
                is_trial: false,
                can_access_features: false,
                message: Some("No active subscription".to_string()),
            };
        };

        let days = days_left(&sub, now);
        let message = match sub.status {
            SubscriptionStatus::Trial => Some(format!("{days} days left in your free trial")),
            SubscriptionStatus::PastDue => Some("Your trial has ended. Please make a payment to continue.".to_string()),
            SubscriptionStatus::Cancelled => Some("Your subscription has been cancelled".to_string()),
            SubscriptionStatus::Expired => Some("Your subscription has expired".to_string()),
            SubscriptionStatus::Active => None,
        };
        Self {
            plan: Some(plan(sub.plan)),
            days_left: days,
            is_trial: sub.status == SubscriptionStatus::Trial,
            can_access_features: matches!(sub.status, SubscriptionStatus::Trial)
                || (sub.status == SubscriptionStatus::Active && sub.current_period_end.is_some_and(|end| end > now)),
            message,
            subscription: Some(sub),
        }
    }
}

/// Trial, plan and billing transitions for team subscriptions.
pub struct SubscriptionService<'a> {
    store: &'a Store,
    config: &'a SubscriptionsConfig,
}

impl<'a> SubscriptionService<'a> {
    pub fn new(store: &'a Store, config: &'a SubscriptionsConfig) -> Self {
        Self { store, config }
    }

    #[instrument(skip(self), err)]
    pub async fn start_trial(&self, team_id: &str, now: DateTime<Utc>) -> Result<SubscriptionDBResponse> {
        let subscription = SubscriptionDBResponse {
            team_id: team_id.to_string(),
            plan: PlanName::Start,
            status: SubscriptionStatus::Trial,
            trial_end_date: Some(now + Duration::days(self.config.trial_days)),
            current_period_start: None,
            current_period_end: None,
            created_at: now,
            updated_at: now,
        };
        Subscriptions::new(self.store).save(&subscription).await?;
        info!(%team_id, trial_days = self.config.trial_days, "Started trial subscription");
        Ok(subscription)
    }

    /// The team's subscription, moving an expired trial to `past_due`.
    #[instrument(skip(self), err)]
    pub async fn current(&self, team_id: &str, now: DateTime<Utc>) -> Result<Option<SubscriptionDBResponse>> {
        let mut repo = Subscriptions::new(self.store);
        let Some(mut subscription) = repo.get(team_id).await? else {
            return Ok(None);
        };

        if subscription.status == SubscriptionStatus::Trial && subscription.trial_end_date.is_some_and(|end| end < now) {
            subscription.status = SubscriptionStatus::PastDue;
            subscription.updated_at = now;
            repo.save(&subscription).await?;
            info!(%team_id, "Trial ended, subscription now past due");
        }
        Ok(Some(subscription))
    }

    /// Switch the team to `plan`. The trial clock keeps running; a missing subscription starts
    /// a fresh trial on that plan.
    #[instrument(skip(self), err)]
    pub async fn change_plan(&self, team_id: &str, plan: PlanName, now: DateTime<Utc>) -> Result<SubscriptionDBResponse> {
        let mut subscription = match self.current(team_id, now).await? {
            Some(existing) => existing,
            None => self.start_trial(team_id, now).await?,
        };
        subscription.plan = plan;
        subscription.updated_at = now;
        Subscriptions::new(self.store).save(&subscription).await?;
        Ok(subscription)
    }

    /// Activate `plan` for one billing period after a completed payment.
    #[instrument(skip(self), err)]
    pub async fn activate(&self, team_id: &str, plan: PlanName, now: DateTime<Utc>) -> Result<SubscriptionDBResponse> {
        let mut repo = Subscriptions::new(self.store);
        let created_at = repo.get(team_id).await?.map(|s| s.created_at).unwrap_or(now);
        let subscription = SubscriptionDBResponse {
            team_id: team_id.to_string(),
            plan,
            status: SubscriptionStatus::Active,
            trial_end_date: None,
            current_period_start: Some(now),
            current_period_end: Some(now + Duration::days(self.config.billing_period_days)),
            created_at,
            updated_at: now,
        };
        repo.save(&subscription).await?;
        info!(%team_id, %plan, "Subscription activated");
        Ok(subscription)
    }

    #[instrument(skip(self), err)]
    pub async fn set_status(&self, team_id: &str, status: SubscriptionStatus, now: DateTime<Utc>) -> Result<Option<SubscriptionDBResponse>> {
        let mut repo = Subscriptions::new(self.store);
        let Some(mut subscription) = repo.get(team_id).await? else {
            return Ok(None);
        };
        subscription.status = status;
        subscription.updated_at = now;
        repo.save(&subscription).await?;
        Ok(Some(subscription))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use std::sync::Arc;

    fn store() -> Store {
        Store::new(Arc::new(MemoryKv::default()))
    }

    #[test]
    fn test_plan_catalogue() {
        let all = plans();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].price_tzs, Some(25_000));
        assert_eq!(all[1].max_users, 3);
        assert_eq!(all[2].price_tzs, Some(120_000));
        assert_eq!(all[3].price_tzs, None);
        assert!(all[3].allows_users(500));
        assert!(!all[0].allows_users(2));

        assert!(plan(PlanName::Pro).has_feature("sms_automation"));
        assert!(!plan(PlanName::Start).has_feature("sms_automation"));
        assert!(plan(PlanName::Enterprise).has_feature("anything"));
    }

    #[test]
    fn test_days_left_rounds_up() {
        let now = Utc::now();
        let mut sub = SubscriptionDBResponse {
            team_id: "t".into(),
            plan: PlanName::Start,
            status: SubscriptionStatus::Trial,
            trial_end_date: Some(now + Duration::hours(25)),
            current_period_start: None,
            current_period_end: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(days_left(&sub, now), 2);

        sub.trial_end_date = Some(now - Duration::hours(1));
        assert_eq!(days_left(&sub, now), 0);
    }

    #[test]
    fn test_feature_access_rules() {
        let now = Utc::now();
        let mut sub = SubscriptionDBResponse {
            team_id: "t".into(),
            plan: PlanName::Start,
            status: SubscriptionStatus::Trial,
            trial_end_date: Some(now + Duration::days(3)),
            current_period_start: None,
            current_period_end: None,
            created_at: now,
            updated_at: now,
        };

        assert!(!has_feature_access(None, "invoicing", now));
        assert!(has_module_access(Some(&sub), "debt-collection", now));
        assert!(!has_module_access(Some(&sub), "sms", now));
        assert!(has_module_access(Some(&sub), "dashboard", now));

        sub.status = SubscriptionStatus::Active;
        assert!(!has_module_access(Some(&sub), "invoices", now));
        sub.current_period_end = Some(now + Duration::days(1));
        assert!(has_module_access(Some(&sub), "invoices", now));

        sub.status = SubscriptionStatus::PastDue;
        assert!(!has_module_access(Some(&sub), "invoices", now));
    }

    #[tokio::test]
    async fn test_trial_lapses_then_payment_activates() {
        let store = store();
        let config = SubscriptionsConfig::default();
        let service = SubscriptionService::new(&store, &config);
        let start = Utc::now();

        let trial = service.start_trial("team-1", start).await.unwrap();
        assert_eq!(trial.trial_end_date, Some(start + Duration::days(14)));

        let later = start + Duration::days(15);
        let lapsed = service.current("team-1", later).await.unwrap().unwrap();
        assert_eq!(lapsed.status, SubscriptionStatus::PastDue);
        let stored = Subscriptions::new(&store).get("team-1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::PastDue);

        let active = service.activate("team-1", PlanName::Grow, later).await.unwrap();
        assert_eq!(active.current_period_end, Some(later + Duration::days(30)));
        assert_eq!(active.created_at, trial.created_at);

        let summary = SubscriptionSummary::new(Some(active), later);
        assert!(summary.can_access_features);
        assert_eq!(summary.days_left, 30);
    }

    #[tokio::test]
    async fn test_change_plan_keeps_trial_clock() {
        let store = store();
        let config = SubscriptionsConfig::default();
        let service = SubscriptionService::new(&store, &config);
        let now = Utc::now();

        let trial = service.start_trial("team-2", now).await.unwrap();
        let changed = service.change_plan("team-2", PlanName::Pro, now + Duration::days(1)).await.unwrap();
        assert_eq!(changed.plan, PlanName::Pro);
        assert_eq!(changed.trial_end_date, trial.trial_end_date);
        assert_eq!(changed.status, SubscriptionStatus::Trial);
    }
}
