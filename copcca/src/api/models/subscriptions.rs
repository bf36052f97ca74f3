//! Subscription, payment and currency models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    currency::Currency,
    db::models::subscriptions::{PaymentDBResponse, PaymentStatus, PlanName, SubscriptionDBResponse, SubscriptionPlan, SubscriptionStatus},
    types::TeamId,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlanListResponse {
    pub plans: Vec<SubscriptionPlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InitializeSubscriptionRequest {
    pub plan: PlanName,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionResponse {
    pub success: bool,
    pub subscription: SubscriptionDBResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub plan: PlanName,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    /// e.g. "mpesa", "tigopesa", "bank"
    pub method: String,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub success: bool,
    pub payment: PaymentDBResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentDBResponse>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AccessQuery {
    /// Module slug, e.g. `sales-hub` or `debt-collection`
    pub module: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessResponse {
    pub module: String,
    pub feature: Option<String>,
    pub allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionListResponse {
    pub subscriptions: Vec<SubscriptionDBResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusUpdate {
    pub team_id: TeamId,
    pub status: SubscriptionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusUpdate {
    pub payment_id: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrencyResponse {
    pub code: String,
    pub symbol: String,
    pub name: String,
    /// Units per US dollar
    pub rate: f64,
}

impl From<&Currency> for CurrencyResponse {
    fn from(currency: &Currency) -> Self {
        Self {
            code: currency.code.to_string(),
            symbol: currency.symbol.to_string(),
            name: currency.name.to_string(),
            rate: currency.rate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrencyListResponse {
    pub currencies: Vec<CurrencyResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConvertRequest {
    pub amount: f64,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConvertResponse {
    pub amount: f64,
    pub formatted: String,
}
