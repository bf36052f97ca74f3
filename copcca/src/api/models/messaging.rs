//! SMS and WhatsApp request/response models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    db::models::sms::{SmsCredits, SmsLanguage, SmsSettings},
    messaging::{
        sms::{OutgoingSms, SmsResult},
        whatsapp::WhatsAppResult,
    },
    types::TeamId,
};

/// Settings as shown to clients: the auth token is masked.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SmsSettingsResponse {
    pub settings: SmsSettings,
    pub enabled: bool,
}

/// Stands in for the stored auth token in responses
pub const MASKED_SECRET: &str = "********";

impl From<SmsSettings> for SmsSettingsResponse {
    fn from(mut settings: SmsSettings) -> Self {
        let enabled = settings.enabled();
        if let Some(token) = settings.twilio_auth_token.as_mut()
            && !token.is_empty()
        {
            *token = MASKED_SECRET.to_string();
        }
        Self { settings, enabled }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SmsCreditsResponse {
    pub credits: SmsCredits,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopUpCreditsRequest {
    pub team_id: TeamId,
    #[schema(value_type = f64)]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SendSmsResponse {
    pub result: SmsResult,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BulkSmsRequest {
    pub messages: Vec<OutgoingSms>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkSmsResponse {
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<SmsResult>,
}

impl BulkSmsResponse {
    pub fn new(results: Vec<SmsResult>) -> Self {
        let sent = results.iter().filter(|r| r.success).count();
        Self {
            sent,
            failed: results.len() - sent,
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DebtReminderSmsRequest {
    pub phone_number: String,
    pub customer_name: String,
    pub invoice_number: String,
    /// Pre-formatted amount, e.g. "TSh 150,000"
    pub amount: String,
    #[serde(default)]
    pub days_overdue: i64,
    pub debt_id: Option<String>,
    /// Overrides the team's configured language
    pub language: Option<SmsLanguage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmationSmsRequest {
    pub phone_number: String,
    pub customer_name: String,
    pub invoice_number: String,
    pub amount: String,
    pub debt_id: Option<String>,
    pub language: Option<SmsLanguage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WhatsAppSendRequest {
    pub to: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WhatsAppBulkRequest {
    pub recipients: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WhatsAppBulkResponse {
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<WhatsAppResult>,
}

impl WhatsAppBulkResponse {
    pub fn new(results: Vec<WhatsAppResult>) -> Self {
        let sent = results.iter().filter(|r| r.success).count();
        Self {
            sent,
            failed: results.len() - sent,
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WhatsAppValidateRequest {
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WhatsAppValidateResponse {
    pub valid: bool,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppTemplateRequest {
    pub to: String,
    pub template_name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
}
