//! SMS delivery for debt collection: credit checks, Twilio or demo delivery, send logs and the
//! English/Swahili message templates.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::SmsConfig,
    db::{
        Store,
        handlers::SmsAccounts,
        models::sms::{SmsLanguage, SmsLogEntry, SmsProvider, SmsStatus},
    },
    errors::{Error, Result},
    messaging::twilio::TwilioClient,
    types::{UserId, now_ms},
};

pub const INVALID_PHONE_MESSAGE: &str = "Invalid phone number format. Use E.164 format (e.g., +1234567890)";
pub const INSUFFICIENT_CREDITS_MESSAGE: &str =
    "Insufficient SMS credits. Please top up your account in Settings → SMS / Automation.";

static E164_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").expect("valid E.164 regex"));

pub fn is_valid_e164(phone: &str) -> bool {
    E164_RE.is_match(phone)
}

/// A message to deliver, optionally tied to a debt record.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingSms {
    pub to: String,
    pub body: String,
    #[serde(default)]
    pub debt_id: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SmsResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub to: String,
    pub provider: SmsProvider,
}

impl SmsResult {
    fn failed(to: &str, provider: SmsProvider, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
            to: to.to_string(),
            provider,
        }
    }
}

/// Sends SMS on behalf of a team, charging its credit balance.
pub struct SmsGateway<'a> {
    store: &'a Store,
    http: &'a reqwest::Client,
    config: &'a SmsConfig,
}

impl<'a> SmsGateway<'a> {
    pub fn new(store: &'a Store, http: &'a reqwest::Client, config: &'a SmsConfig) -> Self {
        Self { store, http, config }
    }

    /// Deliver one message. Fails with 402 when the team cannot afford it; delivery failures are
    /// reported in the result and logged, not returned as errors.
    #[instrument(skip(self, message), fields(to = %message.to), err)]
    pub async fn send(&self, team_id: &str, sent_by: Option<UserId>, message: &OutgoingSms) -> Result<SmsResult> {
        let mut accounts = SmsAccounts::new(self.store);
        let settings = accounts.settings(team_id).await?;
        let twilio = settings.twilio();
        let provider = if twilio.is_some() { SmsProvider::Twilio } else { SmsProvider::Demo };

        // Reserve the cost up front so concurrent sends cannot overdraw the balance
        let cost = self.config.cost_per_sms;
        if accounts.deduct(team_id, cost).await?.is_none() {
            return Err(Error::PaymentRequired {
                message: INSUFFICIENT_CREDITS_MESSAGE.to_string(),
            });
        }

        let result = if !is_valid_e164(&message.to) {
            SmsResult::failed(&message.to, provider, INVALID_PHONE_MESSAGE)
        } else if let Some(creds) = twilio {
            let client = TwilioClient::new(self.http.clone(), &self.config.twilio_base_url, &creds.account_sid, &creds.auth_token);
            match client
                .create_message(&[("To", &message.to), ("From", &creds.from_number), ("Body", &message.body)])
                .await
            {
                Ok(sid) => SmsResult {
                    success: true,
                    message_id: Some(sid),
                    error: None,
                    to: message.to.clone(),
                    provider,
                },
                Err(reason) => SmsResult::failed(&message.to, provider, reason),
            }
        } else {
            info!(to = %message.to, body = %message.body, "Demo SMS mode, message not delivered");
            SmsResult {
                success: true,
                message_id: Some(format!("demo_{}", now_ms())),
                error: None,
                to: message.to.clone(),
                provider,
            }
        };

        let charged = if result.success {
            cost
        } else {
            if let Err(e) = accounts.refund(team_id, cost).await {
                warn!(%team_id, error = %e, "Failed to refund undelivered SMS");
            }
            Decimal::ZERO
        };

        let entry = SmsLogEntry {
            id: Uuid::new_v4(),
            team_id: team_id.to_string(),
            phone_number: message.to.clone(),
            message_body: message.body.clone(),
            status: if result.success { SmsStatus::Sent } else { SmsStatus::Failed },
            provider,
            message_id: result.message_id.clone(),
            error_message: result.error.clone(),
            debt_id: message.debt_id.clone(),
            invoice_number: message.invoice_number.clone(),
            sent_by,
            cost: charged,
            created_at: Utc::now(),
        };
        if let Err(e) = accounts.append_log(team_id, entry).await {
            warn!(error = %e, "Failed to record SMS log");
        }

        Ok(result)
    }

    /// Deliver messages one by one with the configured pause between them. Running out of
    /// credits marks the remaining messages as failed instead of aborting the batch.
    #[instrument(skip(self, messages), fields(count = messages.len()), err)]
    pub async fn send_bulk(&self, team_id: &str, sent_by: Option<UserId>, messages: &[OutgoingSms]) -> Result<Vec<SmsResult>> {
        let mut results = Vec::with_capacity(messages.len());
        for (i, message) in messages.iter().enumerate() {
            let result = match self.send(team_id, sent_by, message).await {
                Ok(result) => result,
                Err(Error::PaymentRequired { message: reason }) => SmsResult::failed(&message.to, SmsProvider::Demo, reason),
                Err(e) => return Err(e),
            };
            results.push(result);

            if i + 1 < messages.len() {
                tokio::time::sleep(self.config.bulk_delay).await;
            }
        }
        Ok(results)
    }
}

/// Urgency prefix by how late the payment is.
pub fn urgency_label(days_overdue: i64, language: SmsLanguage) -> &'static str {
    match (language, days_overdue) {
        (SmsLanguage::En, d) if d > 30 => "URGENT",
        (SmsLanguage::En, d) if d > 14 => "Important",
        (SmsLanguage::En, _) => "Reminder",
        (SmsLanguage::Sw, d) if d > 30 => "DHARURA",
        (SmsLanguage::Sw, d) if d > 14 => "Muhimu",
        (SmsLanguage::Sw, _) => "Ukumbusho",
    }
}

pub fn debt_reminder_message(
    customer_name: &str,
    invoice_number: &str,
    amount: &str,
    days_overdue: i64,
    language: SmsLanguage,
) -> String {
    let urgency = urgency_label(days_overdue, language);
    match language {
        SmsLanguage::Sw => format!(
            "{urgency}: Mpendwa {customer_name}, ankara yako #{invoice_number} ({amount}) imechelewa siku {days_overdue}. Tafadhali lipia haraka iwezekanavyo. Jibu PAID ukilipa. - COPCCA CRM"
        ),
        SmsLanguage::En => format!(
            "{urgency}: Dear {customer_name}, your invoice #{invoice_number} ({amount}) is {days_overdue} days overdue. Please arrange payment at your earliest convenience. Reply PAID when settled. - COPCCA CRM"
        ),
    }
}

pub fn payment_confirmation_message(customer_name: &str, invoice_number: &str, amount: &str, language: SmsLanguage) -> String {
    match language {
        SmsLanguage::Sw => format!(
            "Asante {customer_name}! Tumepokea malipo yako ya {amount} kwa ankara #{invoice_number}. Risiti imetumwa kwa barua pepe yako. - COPCCA CRM"
        ),
        SmsLanguage::En => format!(
            "Thank you {customer_name}! We've received your payment of {amount} for invoice #{invoice_number}. Receipt sent to your email. - COPCCA CRM"
        ),
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SmsStats {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    /// Percentage of messages sent, rounded
    pub delivery_rate: u32,
    pub recent_logs: Vec<SmsLogEntry>,
}

impl SmsStats {
    /// Summarise a newest-first log.
    pub fn from_logs(logs: &[SmsLogEntry]) -> Self {
        let total = logs.len();
        let sent = logs.iter().filter(|l| l.status == SmsStatus::Sent).count();
        let failed = logs.iter().filter(|l| l.status == SmsStatus::Failed).count();
        let delivery_rate = if total > 0 {
            (sent as f64 / total as f64 * 100.0).round() as u32
        } else {
            0
        };
        Self {
            total,
            sent,
            failed,
            delivery_rate,
            recent_logs: logs.iter().take(10).cloned().collect(),
        }
    }
}
