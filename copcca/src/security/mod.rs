//! Account protection: login throttling, password policy, audit trail and session
//! fingerprinting.

pub mod audit;
pub mod fingerprint;
pub mod password_validator;
pub mod rate_limiter;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::convert::Infallible;

use fingerprint::DeviceFingerprint;

/// Request metadata used for rate limiting, auditing and fingerprinting.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: Option<String>,
    pub method: String,
    pub path: String,
    pub fingerprint: DeviceFingerprint,
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            ip: rate_limiter::client_ip(&parts.headers),
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            fingerprint: DeviceFingerprint::from_headers(&parts.headers),
        })
    }
}
