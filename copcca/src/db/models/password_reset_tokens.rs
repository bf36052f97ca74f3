//! Password reset tokens.
//!
//! Tokens are stored under the SHA-256 of the raw value, so a leaked store does not leak
//! usable links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetTokenDBResponse {
    pub user_id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PasswordResetTokenCreateDBRequest {
    pub user_id: UserId,
    pub email: String,
    pub raw_token: String,
    pub expires_at: DateTime<Utc>,
}
