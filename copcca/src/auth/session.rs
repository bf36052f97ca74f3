//! Session tokens: HS256 JWTs signed with `secret_key`, delivered in the body and as a cookie.

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::models::users::CurrentUser,
    config::Config,
    errors::Error,
    types::{Role, TeamId, UserId},
};

/// Claims carried by a session token. Role and team are a snapshot; the stored profile wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub email: String,
    pub team_id: TeamId,
    pub role: Role,
    /// Unique per login, so two sign-ins in the same second still get distinct tokens
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(user: &CurrentUser, config: &Config) -> Self {
        let issued_at = Utc::now();
        Self {
            sub: user.id,
            email: user.email.clone(),
            team_id: user.team_id.clone(),
            role: user.role,
            jti: Uuid::new_v4(),
            iat: issued_at.timestamp(),
            exp: (issued_at + config.auth.security.jwt_expiry).timestamp(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

fn signing_secret(config: &Config) -> Result<&[u8], Error> {
    config
        .secret_key
        .as_deref()
        .map(str::as_bytes)
        .ok_or_else(|| Error::Internal {
            operation: "sign session: secret_key is not configured".to_string(),
        })
}

/// Sign a session token for `user`, returning it with its claims.
pub fn create_session_token(user: &CurrentUser, config: &Config) -> Result<(String, SessionClaims), Error> {
    let claims = SessionClaims::new(user, config);
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(signing_secret(config)?),
    )
    .map_err(|e| Error::Internal {
        operation: format!("sign session: {e}"),
    })?;
    Ok((token, claims))
}

/// Decode a session token. Bad, tampered or expired tokens are a 401; key problems are a 500.
pub fn verify_session_token(token: &str, config: &Config) -> Result<SessionClaims, Error> {
    let key = DecodingKey::from_secret(signing_secret(config)?);
    decode::<SessionClaims>(token, &key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::RsaFailedSigning
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::MissingAlgorithm
            | ErrorKind::Crypto(_) => Error::Internal {
                operation: format!("verify session: {e}"),
            },
            _ => Error::Unauthenticated { message: None },
        })
}

fn cookie_attributes(config: &Config) -> String {
    let session = &config.auth.session;
    let mut same_site = session.cookie_same_site.to_lowercase();
    if let Some(first) = same_site.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    let secure = if session.cookie_secure { "; Secure" } else { "" };
    format!("Path=/; HttpOnly{secure}; SameSite={same_site}")
}

/// `Set-Cookie` value carrying a session token for the JWT lifetime.
pub fn session_cookie(token: &str, config: &Config) -> String {
    format!(
        "{}={token}; {}; Max-Age={}",
        config.auth.session.cookie_name,
        cookie_attributes(config),
        config.auth.security.jwt_expiry.as_secs()
    )
}

/// `Set-Cookie` value that clears the session cookie.
pub fn expired_session_cookie(config: &Config) -> String {
    format!("{}=; {}; Max-Age=0", config.auth.session.cookie_name, cookie_attributes(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> Config {
        let mut config = Config {
            secret_key: Some("session-test-secret".to_string()),
            ..Default::default()
        };
        config.auth.security.jwt_expiry = Duration::from_secs(3600);
        config
    }

    fn amina() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "amina@duka.co.tz".to_string(),
            name: "Amina Juma".to_string(),
            role: Role::Admin,
            team_id: "team-1a2b3c4d".to_string(),
            token: String::new(),
        }
    }

    fn sign(claims: &SessionClaims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_round_trip_keeps_tenant_and_lifetime() {
        let config = config();
        let user = amina();

        let (token, issued) = create_session_token(&user, &config).unwrap();
        let claims = verify_session_token(&token, &config).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.team_id, "team-1a2b3c4d");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.expires_at(), issued.expires_at());
    }

    #[test]
    fn test_logins_in_the_same_second_get_distinct_tokens() {
        let config = config();
        let user = amina();

        let (first, first_claims) = create_session_token(&user, &config).unwrap();
        let (second, second_claims) = create_session_token(&user, &config).unwrap();

        assert_ne!(first_claims.jti, second_claims.jti);
        assert_ne!(first, second);
    }

    #[test]
    fn test_rejected_tokens_are_unauthenticated() {
        let config = config();
        let (claims_source, _) = create_session_token(&amina(), &config).unwrap();
        let mut claims = verify_session_token(&claims_source, &config).unwrap();

        let forged = sign(&claims, "someone-elses-secret");
        claims.exp = (Utc::now() - chrono::Duration::hours(1)).timestamp();
        let expired = sign(&claims, "session-test-secret");

        for token in [forged.as_str(), expired.as_str(), "not.a.token", "", "garbage"] {
            assert!(
                matches!(verify_session_token(token, &config), Err(Error::Unauthenticated { .. })),
                "token should be rejected: {token}"
            );
        }
    }

    #[test]
    fn test_missing_secret_is_internal() {
        let mut config = config();
        config.secret_key = None;
        assert!(matches!(
            create_session_token(&amina(), &config),
            Err(Error::Internal { .. })
        ));
    }

    #[test]
    fn test_cookies() {
        let mut config = config();
        assert_eq!(
            session_cookie("abc", &config),
            "copcca_session=abc; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=3600"
        );

        config.auth.session.cookie_secure = false;
        config.auth.session.cookie_same_site = "LAX".to_string();
        assert_eq!(
            expired_session_cookie(&config),
            "copcca_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
    }
}
