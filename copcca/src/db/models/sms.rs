//! SMS settings, credit balances and the send log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{TeamId, UserId};

/// Log entries kept per team
pub const MAX_SMS_LOGS: usize = 1000;

pub const DEFAULT_REMINDER_INTERVAL_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SmsLanguage {
    #[default]
    En,
    Sw,
}

fn default_interval() -> u32 {
    DEFAULT_REMINDER_INTERVAL_DAYS
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SmsSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twilio_account_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twilio_auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twilio_phone_number: Option<String>,
    #[serde(default)]
    pub language: SmsLanguage,
    #[serde(default = "default_interval")]
    pub reminder_interval_days: u32,
    #[serde(default)]
    pub auto_reminders_enabled: bool,
}

impl Default for SmsSettings {
    fn default() -> Self {
        Self {
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_phone_number: None,
            language: SmsLanguage::En,
            reminder_interval_days: DEFAULT_REMINDER_INTERVAL_DAYS,
            auto_reminders_enabled: false,
        }
    }
}

/// Twilio credentials, present only when all three parts are set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl SmsSettings {
    pub fn twilio(&self) -> Option<TwilioCredentials> {
        let present = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);
        Some(TwilioCredentials {
            account_sid: present(&self.twilio_account_sid)?,
            auth_token: present(&self.twilio_auth_token)?,
            from_number: present(&self.twilio_phone_number)?,
        })
    }

    pub fn enabled(&self) -> bool {
        self.twilio().is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SmsCredits {
    #[schema(value_type = f64)]
    pub balance: Decimal,
    #[schema(value_type = f64)]
    pub total_purchased: Decimal,
    #[schema(value_type = f64)]
    pub total_spent: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SmsStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SmsProvider {
    Twilio,
    Demo,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SmsLogEntry {
    pub id: uuid::Uuid,
    pub team_id: TeamId,
    pub phone_number: String,
    pub message_body: String,
    pub status: SmsStatus,
    pub provider: SmsProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub sent_by: Option<UserId>,
    #[schema(value_type = f64)]
    pub cost: Decimal,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_needs_all_twilio_fields() {
        let mut settings = SmsSettings {
            twilio_account_sid: Some("AC123".into()),
            twilio_auth_token: Some("secret".into()),
            ..Default::default()
        };
        assert!(!settings.enabled());

        settings.twilio_phone_number = Some(String::new());
        assert!(!settings.enabled());

        settings.twilio_phone_number = Some("+255700000000".into());
        assert!(settings.enabled());
        assert_eq!(settings.twilio().unwrap().from_number, "+255700000000");
    }

    #[test]
    fn test_settings_defaults_from_empty_document() {
        let settings: SmsSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.reminder_interval_days, 7);
        assert_eq!(settings.language, SmsLanguage::En);
        assert!(!settings.auto_reminders_enabled);
    }
}
