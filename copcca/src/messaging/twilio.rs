//! Minimal Twilio Messages API client shared by SMS and WhatsApp delivery.

use serde::Deserialize;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct TwilioClient {
    http: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: Option<String>,
    message: Option<String>,
}

impl TwilioClient {
    pub fn new(http: reqwest::Client, base_url: &str, account_sid: &str, auth_token: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}/Messages.json", self.base_url, self.account_sid)
    }

    /// Post a message form. `Ok` carries the message sid, `Err` a provider-facing reason.
    #[instrument(skip(self, form), fields(account = %self.account_sid))]
    pub async fn create_message(&self, form: &[(&str, &str)]) -> Result<String, String> {
        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Twilio request failed");
                e.to_string()
            })?;

        let status = response.status();
        let body: MessageResponse = response.json().await.unwrap_or(MessageResponse { sid: None, message: None });

        if !status.is_success() {
            warn!(%status, message = ?body.message, "Twilio rejected message");
            return Err(body.message.unwrap_or_else(|| format!("Twilio returned {status}")));
        }

        debug!(sid = ?body.sid, "Twilio accepted message");
        Ok(body.sid.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, header_exists, method, path},
    };

    #[tokio::test]
    async fn test_create_message_returns_sid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC1/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=%2B255700000001"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "sid": "SM123" })))
            .mount(&server)
            .await;

        let client = TwilioClient::new(crate::http_client().unwrap(), &server.uri(), "AC1", "token");
        let sid = client
            .create_message(&[("To", "+255700000001"), ("From", "+15005550006"), ("Body", "hi")])
            .await
            .unwrap();
        assert_eq!(sid, "SM123");
    }

    #[tokio::test]
    async fn test_provider_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({ "message": "The 'To' number is not valid" })),
            )
            .mount(&server)
            .await;

        let client = TwilioClient::new(crate::http_client().unwrap(), &server.uri(), "AC1", "token");
        let err = client.create_message(&[("To", "+1")]).await.unwrap_err();
        assert_eq!(err, "The 'To' number is not valid");
    }
}
