//! Authentication payloads.
//!
//! Responses that open or close a session carry a `Set-Cookie` header next to their JSON body,
//! so they implement [`IntoResponse`] themselves.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::users::UserResponse;
use crate::security::password_validator::PasswordStrength;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    /// A value starting with `+` is treated as a phone number
    pub phone_or_email: String,
    pub password: String,
    pub company: Option<String>,
    /// Joins the inviting team as a `user`; without one the caller owns a new team
    pub invite_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub phone_or_email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub user: UserResponse,
    pub token: String,
}

/// An [`AuthResponse`] with its session cookie and status code.
#[derive(Debug)]
pub struct SessionResponse {
    pub status: StatusCode,
    pub body: AuthResponse,
    pub cookie: String,
}

impl IntoResponse for SessionResponse {
    fn into_response(self) -> Response {
        (self.status, [(header::SET_COOKIE, self.cookie)], Json(self.body)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Logout answer that also clears the cookie.
#[derive(Debug)]
pub struct LogoutResponse {
    pub body: MessageResponse,
    pub cookie: String,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        ([(header::SET_COOKIE, self.cookie)], Json(self.body)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyResetTokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyResetTokenResponse {
    pub valid: bool,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdatePasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordStrengthRequest {
    pub password: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
}

/// Validator output plus the display label for its strength
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PasswordStrengthResponse {
    pub is_valid: bool,
    pub strength: PasswordStrength,
    pub label: String,
    pub score: u8,
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GeneratePasswordQuery {
    /// Defaults to 16, clamped to 12..=128
    pub length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GeneratedPasswordResponse {
    pub password: String,
}
