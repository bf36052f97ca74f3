//! Email service for team invitations and password reset links.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use serde_json::json;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
    types::Role,
    utils::text::format_role,
};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    base_url: String,
}

enum EmailTransport {
    Disabled,
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
    Resend {
        client: reqwest::Client,
        api_key: String,
        api_url: String,
    },
}

/// Details rendered into an invitation email.
#[derive(Debug, Clone)]
pub struct Invitation<'a> {
    pub to: &'a str,
    pub recipient_name: &'a str,
    pub inviter_name: &'a str,
    pub company_name: &'a str,
    pub role: Role,
    pub invite_code: &'a str,
    pub expiry_days: u64,
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Disabled => EmailTransport::Disabled,
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
            EmailTransportConfig::Resend { api_key, api_url } => EmailTransport::Resend {
                client: crate::http_client()?,
                api_key: api_key.clone(),
                api_url: api_url.clone(),
            },
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            base_url: email_config.app_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Whether emails actually leave the process.
    pub fn is_configured(&self) -> bool {
        !matches!(self.transport, EmailTransport::Disabled)
    }

    pub fn invite_link(&self, code: &str) -> String {
        format!("{}/signup?invite={}", self.base_url, code)
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/reset-password?token={}", self.base_url, token)
    }

    /// Send a team invitation. Returns false when email is disabled.
    pub async fn send_invitation_email(&self, invitation: &Invitation<'_>) -> Result<bool, Error> {
        let subject = format!("You're invited to join {} on COPCCA CRM", invitation.company_name);
        let body = self.create_invitation_body(invitation);
        self.send_email(invitation.to, Some(invitation.recipient_name), &subject, &body)
            .await
    }

    /// Send a password reset link. Returns false when email is disabled.
    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        token: &str,
        expires_in_minutes: u64,
    ) -> Result<bool, Error> {
        let body = self.create_password_reset_body(to_name, &self.reset_link(token), expires_in_minutes);
        self.send_email(to_email, to_name, "Reset your COPCCA CRM password", &body)
            .await
    }

    async fn send_email(&self, to_email: &str, to_name: Option<&str>, subject: &str, body: &str) -> Result<bool, Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email);

        match &self.transport {
            EmailTransport::Disabled => {
                info!(to = %to_email, %subject, "Email transport disabled, not sending");
                return Ok(false);
            }
            EmailTransport::Resend {
                client,
                api_key,
                api_url,
            } => {
                let response = client
                    .post(api_url)
                    .bearer_auth(api_key)
                    .json(&json!({
                        "from": from,
                        "to": [to_email],
                        "subject": subject,
                        "html": body,
                    }))
                    .send()
                    .await
                    .map_err(|e| Error::Internal {
                        operation: format!("call Resend API: {e}"),
                    })?;

                if !response.status().is_success() {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    return Err(Error::Internal {
                        operation: format!("send email via Resend ({status}): {text}"),
                    });
                }
                debug!(to = %to_email, "Email accepted by Resend");
                return Ok(true);
            }
            EmailTransport::Smtp(_) | EmailTransport::File(_) => {}
        }

        let from = from.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse from email: {e}"),
        })?;

        let to = if let Some(name) = to_name {
            format!("{name} <{to_email}>")
        } else {
            to_email.to_string()
        }
        .parse::<Mailbox>()
        .map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
            EmailTransport::Disabled | EmailTransport::Resend { .. } => {}
        }

        Ok(true)
    }

    fn create_invitation_body(&self, invitation: &Invitation<'_>) -> String {
        let Invitation {
            recipient_name,
            inviter_name,
            company_name,
            role,
            invite_code,
            expiry_days,
            ..
        } = invitation;
        let link = self.invite_link(invite_code);
        let role_name = format_role(&role.to_string());
        let access = match role {
            Role::Admin => "You'll have full access to manage the team and view all data.",
            Role::User => "You'll be able to manage your own customer data and tasks.",
        };

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Team Invitation</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #374151;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2>You're Invited!</h2>
        <p>Hi <strong>{recipient_name}</strong>,</p>
        <p><strong>{inviter_name}</strong> has invited you to join <strong>{company_name}</strong> on COPCCA CRM!</p>
        <p><strong>Your Role:</strong> {role_name}<br>{access}</p>
        <p>Click the link below to create your account and get started:</p>
        <p><a href="{link}">Accept Invitation</a></p>
        <p>{link}</p>
        <p>This invitation will expire in {expiry_days} days.</p>
        <p style="font-size: 12px; color: #6b7280;">Sent from {company_name} via COPCCA CRM. If you didn't expect this invitation, you can safely ignore this email.</p>
    </div>
</body>
</html>"#
        )
    }

    fn create_password_reset_body(&self, to_name: Option<&str>, reset_link: &str, expires_in_minutes: u64) -> String {
        let greeting = if let Some(name) = to_name {
            format!("Hello {name},")
        } else {
            "Hello,".to_string()
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Password Reset Request</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2>Password Reset Request</h2>
        <p>{greeting}</p>
        <p>We received a request to reset your COPCCA CRM password. If you didn't make this request, you can safely ignore this email.</p>
        <p><a href="{reset_link}">Reset your password</a></p>
        <p>Or copy and paste this link into your browser:</p>
        <p>{reset_link}</p>
        <p>This link will expire in {expires_in_minutes} minutes.</p>
    </div>
</body>
</html>"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    fn invitation(to: &str) -> Invitation<'_> {
        Invitation {
            to,
            recipient_name: "Neema",
            inviter_name: "Amina",
            company_name: "Duka Bora",
            role: Role::User,
            invite_code: "invite_1700000000000_abc1234",
            expiry_days: 7,
        }
    }

    #[tokio::test]
    async fn test_disabled_transport_reports_not_sent() {
        let config = create_test_config();
        let service = EmailService::new(&config).unwrap();
        assert!(!service.is_configured());

        let sent = service.send_invitation_email(&invitation("neema@duka.co.tz")).await.unwrap();
        assert!(!sent);
    }

    #[tokio::test]
    async fn test_file_transport_writes_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config();
        config.email.transport = EmailTransportConfig::File {
            path: dir.path().to_string_lossy().to_string(),
        };
        let service = EmailService::new(&config).unwrap();

        let sent = service
            .send_password_reset_email("baraka@duka.co.tz", Some("Baraka"), "tok123", 60)
            .await
            .unwrap();
        assert!(sent);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let raw = std::fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        // Bodies are quoted-printable: undo soft line breaks and the escaped `=`
        let contents = raw.replace("=\r\n", "").replace("=\n", "").replace("=3D", "=");
        assert!(contents.contains("reset-password?token=tok123"));
        assert!(contents.contains("baraka@duka.co.tz"));
    }

    #[tokio::test]
    async fn test_resend_transport_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .and(body_partial_json(json!({ "to": ["neema@duka.co.tz"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = create_test_config();
        config.email.transport = EmailTransportConfig::Resend {
            api_key: "re_test".into(),
            api_url: format!("{}/emails", server.uri()),
        };
        let service = EmailService::new(&config).unwrap();

        assert!(service.send_invitation_email(&invitation("neema@duka.co.tz")).await.unwrap());
    }

    #[tokio::test]
    async fn test_resend_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid from"))
            .mount(&server)
            .await;

        let mut config = create_test_config();
        config.email.transport = EmailTransportConfig::Resend {
            api_key: "re_test".into(),
            api_url: server.uri(),
        };
        let service = EmailService::new(&config).unwrap();
        assert!(service.send_invitation_email(&invitation("x@y.co")).await.is_err());
    }

    #[test]
    fn test_invitation_body() {
        let service = EmailService::new(&create_test_config()).unwrap();
        let body = service.create_invitation_body(&invitation("neema@duka.co.tz"));

        assert!(body.contains("Hi <strong>Neema</strong>"));
        assert!(body.contains("<strong>Amina</strong> has invited you to join <strong>Duka Bora</strong>"));
        assert!(body.contains("Your Role:</strong> User"));
        assert!(body.contains("/signup?invite=invite_1700000000000_abc1234"));
        assert!(body.contains("expire in 7 days"));
    }
}
