//! WhatsApp messages through Twilio's WhatsApp channel, using platform-wide credentials.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    config::WhatsAppConfig,
    errors::{Error, Result},
    messaging::twilio::TwilioClient,
};

pub const NOT_CONFIGURED_MESSAGE: &str =
    "WhatsApp API is not configured. Please add WHATSAPP_API_KEY to environment variables.";

static WHATSAPP_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+\d{10,15}$").expect("valid WhatsApp number regex"));

/// Strip everything but digits and `+`, then make sure the number starts with `+`.
pub fn format_number(phone: &str) -> String {
    let cleaned: String = phone.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
    if cleaned.starts_with('+') { cleaned } else { format!("+{cleaned}") }
}

pub fn is_valid_number(phone: &str) -> bool {
    WHATSAPP_NUMBER_RE.is_match(&format_number(phone))
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppResult {
    pub success: bool,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct WhatsAppSender {
    client: TwilioClient,
    from: String,
    bulk_delay: std::time::Duration,
}

impl WhatsAppSender {
    /// Fails with 503 unless both the account sid and API key are configured.
    pub fn from_config(config: &WhatsAppConfig, http: reqwest::Client) -> Result<Self> {
        let (Some(sid), Some(key)) = (config.account_sid.as_deref(), config.api_key.as_deref()) else {
            return Err(Error::ServiceUnavailable {
                message: NOT_CONFIGURED_MESSAGE.to_string(),
            });
        };
        Ok(Self {
            client: TwilioClient::new(http, &config.api_base_url, sid, key),
            from: format!("whatsapp:{}", config.from_number),
            bulk_delay: config.bulk_delay,
        })
    }

    #[instrument(skip(self, message))]
    pub async fn send(&self, to: &str, message: &str) -> WhatsAppResult {
        self.deliver(to, &[("Body", message)]).await
    }

    /// Send a pre-approved content template; parameters fill its numbered placeholders.
    #[instrument(skip(self, parameters))]
    pub async fn send_template(&self, to: &str, template_name: &str, parameters: &[String]) -> WhatsAppResult {
        let variables: BTreeMap<String, &String> = parameters
            .iter()
            .enumerate()
            .map(|(i, p)| ((i + 1).to_string(), p))
            .collect();
        let variables = serde_json::to_string(&variables).unwrap_or_else(|_| "{}".to_string());
        self.deliver(to, &[("ContentSid", template_name), ("ContentVariables", &variables)])
            .await
    }

    #[instrument(skip(self, recipients, message), fields(count = recipients.len()))]
    pub async fn send_bulk(&self, recipients: &[String], message: &str) -> Vec<WhatsAppResult> {
        let mut results = Vec::with_capacity(recipients.len());
        for (i, to) in recipients.iter().enumerate() {
            results.push(self.send(to, message).await);
            if i + 1 < recipients.len() {
                tokio::time::sleep(self.bulk_delay).await;
            }
        }
        results
    }

    async fn deliver(&self, to: &str, content: &[(&str, &str)]) -> WhatsAppResult {
        let number = format_number(to);
        if !is_valid_number(&number) {
            return WhatsAppResult {
                success: false,
                to: to.to_string(),
                message_id: None,
                error: Some("Phone number must be in international format (e.g., +1234567890)".to_string()),
            };
        }

        let recipient = format!("whatsapp:{number}");
        let mut form = vec![("From", self.from.as_str()), ("To", recipient.as_str())];
        form.extend_from_slice(content);

        match self.client.create_message(&form).await {
            Ok(sid) => WhatsAppResult {
                success: true,
                to: number,
                message_id: Some(sid),
                error: None,
            },
            Err(reason) => WhatsAppResult {
                success: false,
                to: number,
                message_id: None,
                error: Some(reason),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method},
    };

    fn config(base: &str) -> WhatsAppConfig {
        WhatsAppConfig {
            api_base_url: base.to_string(),
            account_sid: Some("AC5".into()),
            api_key: Some("key".into()),
            bulk_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number("255 712-345-678"), "+255712345678");
        assert!(is_valid_number("+255 712 345 678"));
        assert!(!is_valid_number("12345"));
    }

    #[test]
    fn test_unconfigured_is_unavailable() {
        let err = WhatsAppSender::from_config(&WhatsAppConfig::default(), crate::http_client().unwrap())
            .err()
            .unwrap();
        assert_eq!(err.user_message(), NOT_CONFIGURED_MESSAGE);
    }

    #[tokio::test]
    async fn test_send_and_bulk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("To=whatsapp%3A%2B255712345678"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "sid": "WA1" })))
            .mount(&server)
            .await;

        let sender = WhatsAppSender::from_config(&config(&server.uri()), crate::http_client().unwrap()).unwrap();
        let result = sender.send("255712345678", "Habari").await;
        assert!(result.success);
        assert_eq!(result.message_id.as_deref(), Some("WA1"));

        let results = sender
            .send_bulk(&["+255712345678".to_string(), "123".to_string()], "Habari")
            .await;
        assert!(results[0].success);
        assert!(!results[1].success);
    }

    #[tokio::test]
    async fn test_template_variables() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("ContentSid=HXreminder"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "sid": "WA2" })))
            .expect(1)
            .mount(&server)
            .await;

        let sender = WhatsAppSender::from_config(&config(&server.uri()), crate::http_client().unwrap()).unwrap();
        let result = sender
            .send_template("+255712345678", "HXreminder", &["Juma".to_string()])
            .await;
        assert!(result.success);
    }
}
