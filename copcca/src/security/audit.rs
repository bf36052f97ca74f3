//! Security audit trail.
//!
//! Security-relevant events (logins, password resets, role changes, suspected session
//! hijacking) are appended to a per-user log, newest first. Writing an audit entry never fails
//! the request that triggered it: storage errors are logged and dropped.

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::{Store, errors::Result, keys};
use crate::security::ClientInfo;
use crate::types::UserId;

/// Entries kept per user
pub const MAX_AUDIT_ENTRIES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SecurityAction {
    Login,
    Logout,
    LoginFailed,
    PasswordChange,
    PasswordResetRequest,
    PasswordResetComplete,
    #[serde(rename = "2fa_enabled")]
    TwoFactorEnabled,
    #[serde(rename = "2fa_disabled")]
    TwoFactorDisabled,
    #[serde(rename = "2fa_verified")]
    TwoFactorVerified,
    #[serde(rename = "2fa_failed")]
    TwoFactorFailed,
    EmailChange,
    ProfileUpdate,
    UserCreated,
    UserDeleted,
    RoleChanged,
    DataExport,
    DataImport,
    SensitiveDataAccess,
    SettingsChange,
    ApiKeyCreated,
    ApiKeyDeleted,
    SessionCreated,
    SessionHijackDetected,
    SuspiciousActivity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    #[default]
    Success,
    Failed,
    Blocked,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Builder)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    pub action: SecurityAction,
    #[builder(default)]
    pub status: AuditStatus,
    #[builder(into)]
    pub ip_address: Option<String>,
    #[builder(into)]
    pub user_agent: Option<String>,
    #[builder(into)]
    pub request_method: Option<String>,
    #[builder(into)]
    pub request_path: Option<String>,
    #[builder(into)]
    pub error_message: Option<String>,
    pub metadata: Option<Value>,
    #[builder(default = Utc::now())]
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuditLogger {
    store: Store,
}

impl AuditLogger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Append an entry to its user's trail. Entries without a user are only traced.
    #[instrument(skip(self, entry), fields(action = ?entry.action, status = ?entry.status))]
    pub async fn log(&self, entry: AuditEntry) {
        match entry.status {
            AuditStatus::Success => info!(user_id = ?entry.user_id, "Security event"),
            _ => warn!(user_id = ?entry.user_id, error = ?entry.error_message, "Security event"),
        }

        let Some(user_id) = entry.user_id else {
            return;
        };

        if let Err(e) = self.append(&user_id, entry).await {
            error!(%user_id, "Failed to write audit entry: {}", e);
        }
    }

    /// Shorthand for an event tied to the current HTTP request.
    pub async fn record(&self, client: &ClientInfo, user_id: Option<UserId>, action: SecurityAction, status: AuditStatus) {
        let entry = AuditEntry::builder()
            .maybe_user_id(user_id)
            .action(action)
            .status(status)
            .ip_address(client.ip.clone())
            .maybe_user_agent(client.user_agent.clone())
            .request_method(client.method.clone())
            .request_path(client.path.clone())
            .build();
        self.log(entry).await;
    }

    async fn append(&self, user_id: &UserId, entry: AuditEntry) -> Result<()> {
        let key = keys::audit(user_id);
        let _guard = self.store.lock(&key).await;
        let mut entries: Vec<AuditEntry> = self.store.get_list(&key).await?;
        entries.insert(0, entry);
        entries.truncate(MAX_AUDIT_ENTRIES);
        self.store.set_json(&key, &entries).await
    }

    /// Most recent entries for a user, newest first.
    pub async fn list(&self, user_id: &UserId, limit: usize) -> Result<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = self.store.get_list(&keys::audit(user_id)).await?;
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use serde_json::json;
    use std::sync::Arc;

    fn logger() -> AuditLogger {
        AuditLogger::new(Store::new(Arc::new(MemoryKv::default())))
    }

    #[test]
    fn test_action_wire_names() {
        assert_eq!(serde_json::to_value(SecurityAction::TwoFactorEnabled).unwrap(), json!("2fa_enabled"));
        assert_eq!(
            serde_json::to_value(SecurityAction::SessionHijackDetected).unwrap(),
            json!("session_hijack_detected")
        );
        assert_eq!(serde_json::to_value(AuditStatus::default()).unwrap(), json!("success"));
    }

    #[tokio::test]
    async fn test_entries_are_newest_first_and_capped() {
        let logger = logger();
        let user = Uuid::new_v4();

        for i in 0..(MAX_AUDIT_ENTRIES + 5) {
            let entry = AuditEntry::builder()
                .user_id(user)
                .action(SecurityAction::Login)
                .metadata(json!({ "n": i }))
                .build();
            logger.log(entry).await;
        }

        let entries = logger.list(&user, usize::MAX).await.unwrap();
        assert_eq!(entries.len(), MAX_AUDIT_ENTRIES);
        assert_eq!(entries[0].metadata, Some(json!({ "n": MAX_AUDIT_ENTRIES + 4 })));

        let limited = logger.list(&user, 3).await.unwrap();
        assert_eq!(limited.len(), 3);
    }

    #[tokio::test]
    async fn test_anonymous_entries_are_not_stored() {
        let logger = logger();
        let entry = AuditEntry::builder()
            .action(SecurityAction::LoginFailed)
            .status(AuditStatus::Failed)
            .error_message("Invalid credentials")
            .build();
        logger.log(entry).await;

        let rows = logger.store.get_by_prefix("audit:").await.unwrap();
        assert!(rows.is_empty());
    }
}
