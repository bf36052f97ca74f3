//! Session and audit trail models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    security::{audit::AuditEntry, fingerprint::SessionRecord},
    types::UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: Uuid,
    pub browser: String,
    pub os: String,
    pub device_type: String,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Whether this is the session making the request
    pub current: bool,
}

impl SessionInfo {
    pub fn from_record(record: SessionRecord, current_token_hash: &str) -> Self {
        Self {
            current: record.token_hash == current_token_hash,
            id: record.id,
            browser: record.fingerprint.browser,
            os: record.fingerprint.os,
            device_type: record.fingerprint.device_type,
            ip_address: record.fingerprint.ip_address,
            created_at: record.created_at,
            last_activity: record.last_activity,
            expires_at: record.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RevokeSessionsResponse {
    pub success: bool,
    pub revoked: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    /// Defaults to 50
    pub limit: Option<usize>,
    /// Admins may read a teammate's trail
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditListResponse {
    pub entries: Vec<AuditEntry>,
}
