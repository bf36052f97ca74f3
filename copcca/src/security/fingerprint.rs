//! Session fingerprinting.
//!
//! Each issued session token is registered under the SHA-256 of the token together with a
//! fingerprint of the device that logged in. Authenticated requests are checked against it:
//! a different device, browser or OS means the token was probably lifted and the session is
//! refused. IP changes are common on mobile networks and are only audited.

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::{Store, errors::Result, keys};
use crate::security::audit::{AuditEntry, AuditLogger, AuditStatus, SecurityAction};
use crate::security::rate_limiter::client_ip;
use crate::types::UserId;

pub const UNKNOWN: &str = "unknown";

/// Client-supplied extra entropy for the device fingerprint
pub const DEVICE_FINGERPRINT_HEADER: &str = "x-device-fingerprint";

pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFingerprint {
    pub device_fingerprint: String,
    pub ip_address: String,
    pub user_agent: String,
    pub browser: String,
    pub os: String,
    pub device_type: String,
}

impl DeviceFingerprint {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();

        let user_agent = value(header::USER_AGENT.as_str());
        let language = value(header::ACCEPT_LANGUAGE.as_str());
        let extra = value(DEVICE_FINGERPRINT_HEADER);

        let ip = client_ip(headers);
        let ip_address = if ip == "0.0.0.0" { UNKNOWN.to_string() } else { ip };

        Self {
            device_fingerprint: format!("{:x}", Sha256::digest(format!("{user_agent}|{language}|{extra}").as_bytes())),
            ip_address,
            browser: parse_browser(&user_agent).to_string(),
            os: parse_os(&user_agent).to_string(),
            device_type: parse_device_type(&user_agent).to_string(),
            user_agent,
        }
    }
}

// Order matters: Edge and Opera also advertise Chrome, Chrome also advertises Safari.
fn parse_browser(ua: &str) -> &'static str {
    if ua.contains("Edg/") {
        "Edge"
    } else if ua.contains("OPR/") || ua.contains("Opera") {
        "Opera"
    } else if ua.contains("Firefox/") {
        "Firefox"
    } else if ua.contains("Chrome/") || ua.contains("CriOS/") {
        "Chrome"
    } else if ua.contains("Safari/") {
        "Safari"
    } else {
        UNKNOWN
    }
}

fn parse_os(ua: &str) -> &'static str {
    if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("Android") {
        "Android"
    } else if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iOS") {
        "iOS"
    } else if ua.contains("Mac OS X") || ua.contains("Macintosh") {
        "macOS"
    } else if ua.contains("Linux") {
        "Linux"
    } else {
        UNKNOWN
    }
}

fn parse_device_type(ua: &str) -> &'static str {
    if ua.contains("iPad") || ua.contains("Tablet") {
        "tablet"
    } else if ua.contains("Mobile") {
        "mobile"
    } else {
        "desktop"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub token_hash: String,
    #[serde(flatten)]
    pub fingerprint: DeviceFingerprint,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    Valid,
    Invalid(String),
}

/// Registry of live sessions and their fingerprints.
#[derive(Clone)]
pub struct SessionRegistry {
    store: Store,
    audit: AuditLogger,
}

impl SessionRegistry {
    pub fn new(store: Store, audit: AuditLogger) -> Self {
        Self { store, audit }
    }

    #[instrument(skip(self, token, fingerprint), err)]
    pub async fn register(
        &self,
        user_id: UserId,
        token: &str,
        fingerprint: DeviceFingerprint,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        let now = Utc::now();
        let record = SessionRecord {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash_token(token),
            fingerprint,
            created_at: now,
            last_activity: now,
            expires_at,
        };

        self.store.set_json(&keys::session(&record.token_hash), &record).await?;

        let index_key = keys::session_index(&user_id);
        let _guard = self.store.lock(&index_key).await;
        let mut index: Vec<String> = self.store.get_list(&index_key).await?;
        if !index.contains(&record.token_hash) {
            index.push(record.token_hash.clone());
            self.store.set_json(&index_key, &index).await?;
        }

        debug!(session_id = %record.id, "Registered session");
        Ok(record)
    }

    /// Compare the presenting device with the one that opened the session.
    #[instrument(skip(self, token, current), err)]
    pub async fn verify(&self, user_id: UserId, token: &str, current: &DeviceFingerprint) -> Result<SessionCheck> {
        let key = keys::session(&hash_token(token));
        let Some(mut stored) = self.store.get_json::<SessionRecord>(&key).await? else {
            return Ok(SessionCheck::Invalid("Session not found".to_string()));
        };
        if stored.user_id != user_id {
            return Ok(SessionCheck::Invalid("Session not found".to_string()));
        }

        let now = Utc::now();
        if stored.expires_at < now {
            self.store.del(&key).await?;
            return Ok(SessionCheck::Invalid("Session expired".to_string()));
        }

        let mut changes = Vec::new();
        if stored.fingerprint.device_fingerprint != current.device_fingerprint {
            changes.push("device_fingerprint_mismatch");
        }
        if stored.fingerprint.browser != current.browser {
            changes.push("browser_change");
        }
        if stored.fingerprint.os != current.os {
            changes.push("os_change");
        }
        let ip_changed = stored.fingerprint.ip_address != current.ip_address && current.ip_address != UNKNOWN;

        if !changes.is_empty() {
            let mut suspicious = changes.clone();
            if ip_changed {
                suspicious.push("ip_address_change");
            }
            warn!(%user_id, changes = ?changes, "Possible session hijack");
            let entry = AuditEntry::builder()
                .user_id(user_id)
                .action(SecurityAction::SessionHijackDetected)
                .status(AuditStatus::Blocked)
                .ip_address(current.ip_address.clone())
                .user_agent(current.user_agent.clone())
                .error_message(changes.join(", "))
                .metadata(json!({
                    "stored_fingerprint": stored.fingerprint.device_fingerprint,
                    "current_fingerprint": current.device_fingerprint,
                    "suspicious_changes": suspicious,
                }))
                .build();
            self.audit.log(entry).await;
            return Ok(SessionCheck::Invalid(format!("Session verification failed: {}", changes.join(", "))));
        }

        if ip_changed {
            let entry = AuditEntry::builder()
                .user_id(user_id)
                .action(SecurityAction::SuspiciousActivity)
                .status(AuditStatus::Warning)
                .ip_address(current.ip_address.clone())
                .user_agent(current.user_agent.clone())
                .error_message("IP address changed during session")
                .metadata(json!({
                    "old_ip": stored.fingerprint.ip_address,
                    "new_ip": current.ip_address,
                }))
                .build();
            self.audit.log(entry).await;
            // Audit each new address once rather than on every request
            stored.fingerprint.ip_address = current.ip_address.clone();
        }

        stored.last_activity = now;
        self.store.set_json(&key, &stored).await?;
        Ok(SessionCheck::Valid)
    }

    /// Unexpired sessions, most recently active first. Dead index entries are pruned.
    #[instrument(skip(self), err)]
    pub async fn list_active(&self, user_id: UserId) -> Result<Vec<SessionRecord>> {
        let index_key = keys::session_index(&user_id);
        let _guard = self.store.lock(&index_key).await;
        let index: Vec<String> = self.store.get_list(&index_key).await?;

        let now = Utc::now();
        let mut live = Vec::with_capacity(index.len());
        let mut expired = Vec::new();
        for hash in &index {
            match self.store.get_json::<SessionRecord>(&keys::session(hash)).await? {
                Some(record) if record.expires_at >= now => live.push(record),
                Some(_) => expired.push(keys::session(hash)),
                None => {}
            }
        }

        self.store.mdel(&expired).await?;
        if live.len() != index.len() {
            let kept: Vec<&String> = live.iter().map(|r| &r.token_hash).collect();
            self.store.set_json(&index_key, &kept).await?;
        }

        live.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(live)
    }

    /// Revoke one of the user's sessions by id. Returns false when no such session exists.
    #[instrument(skip(self), err)]
    pub async fn revoke(&self, user_id: UserId, session_id: Uuid) -> Result<bool> {
        let sessions = self.list_active(user_id).await?;
        let Some(session) = sessions.into_iter().find(|s| s.id == session_id) else {
            return Ok(false);
        };
        self.remove(user_id, &[session.token_hash]).await?;
        Ok(true)
    }

    /// Drop the session belonging to `token`, e.g. on logout.
    pub async fn revoke_token(&self, user_id: UserId, token: &str) -> Result<()> {
        self.remove(user_id, &[hash_token(token)]).await
    }

    /// Revoke every session except the one presenting `current_token`.
    #[instrument(skip(self, current_token), err)]
    pub async fn revoke_others(&self, user_id: UserId, current_token: &str) -> Result<usize> {
        let current = hash_token(current_token);
        let others: Vec<String> = self
            .list_active(user_id)
            .await?
            .into_iter()
            .map(|s| s.token_hash)
            .filter(|hash| *hash != current)
            .collect();
        let count = others.len();
        self.remove(user_id, &others).await?;
        Ok(count)
    }

    /// Remove every session of a user (account deletion).
    pub async fn revoke_all(&self, user_id: UserId) -> Result<()> {
        let index: Vec<String> = self.store.get_list(&keys::session_index(&user_id)).await?;
        self.remove(user_id, &index).await
    }

    async fn remove(&self, user_id: UserId, hashes: &[String]) -> Result<()> {
        let session_keys: Vec<String> = hashes.iter().map(|h| keys::session(h)).collect();
        self.store.mdel(&session_keys).await?;

        let index_key = keys::session_index(&user_id);
        let _guard = self.store.lock(&index_key).await;
        let mut index: Vec<String> = self.store.get_list(&index_key).await?;
        index.retain(|h| !hashes.contains(h));
        if index.is_empty() {
            self.store.del(&index_key).await?;
        } else {
            self.store.set_json(&index_key, &index).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use axum::http::HeaderValue;
    use chrono::Duration;
    use std::sync::Arc;

    const CHROME_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";
    const FIREFOX_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1";

    fn registry() -> (SessionRegistry, AuditLogger) {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let audit = AuditLogger::new(store.clone());
        (SessionRegistry::new(store, audit.clone()), audit)
    }

    fn fingerprint(ua: &str, ip: Option<&str>) -> DeviceFingerprint {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_str(ua).unwrap());
        if let Some(ip) = ip {
            headers.insert("x-real-ip", HeaderValue::from_str(ip).unwrap());
        }
        DeviceFingerprint::from_headers(&headers)
    }

    #[test]
    fn test_user_agent_parsing() {
        let fp = fingerprint(CHROME_MAC, None);
        assert_eq!((fp.browser.as_str(), fp.os.as_str(), fp.device_type.as_str()), ("Chrome", "macOS", "desktop"));
        assert_eq!(fp.ip_address, UNKNOWN);

        let fp = fingerprint(FIREFOX_WIN, Some("10.0.0.1"));
        assert_eq!((fp.browser.as_str(), fp.os.as_str()), ("Firefox", "Windows"));
        assert_eq!(fp.ip_address, "10.0.0.1");

        let fp = fingerprint(SAFARI_IPHONE, None);
        assert_eq!((fp.browser.as_str(), fp.os.as_str(), fp.device_type.as_str()), ("Safari", "iOS", "mobile"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(fingerprint(CHROME_MAC, None), fingerprint(CHROME_MAC, None));
        assert_ne!(
            fingerprint(CHROME_MAC, None).device_fingerprint,
            fingerprint(FIREFOX_WIN, None).device_fingerprint
        );
        assert_eq!(hash_token("abc").len(), 64);
    }

    #[tokio::test]
    async fn test_same_device_is_accepted() {
        let (registry, _) = registry();
        let user = Uuid::new_v4();
        let expires = Utc::now() + Duration::hours(1);
        registry.register(user, "tok", fingerprint(CHROME_MAC, Some("1.1.1.1")), expires).await.unwrap();

        let check = registry.verify(user, "tok", &fingerprint(CHROME_MAC, Some("1.1.1.1"))).await.unwrap();
        assert_eq!(check, SessionCheck::Valid);

        let check = registry.verify(Uuid::new_v4(), "tok", &fingerprint(CHROME_MAC, None)).await.unwrap();
        assert_eq!(check, SessionCheck::Invalid("Session not found".into()));
    }

    #[tokio::test]
    async fn test_device_change_is_rejected_and_audited() {
        let (registry, audit) = registry();
        let user = Uuid::new_v4();
        registry
            .register(user, "tok", fingerprint(CHROME_MAC, None), Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let check = registry.verify(user, "tok", &fingerprint(FIREFOX_WIN, None)).await.unwrap();
        match check {
            SessionCheck::Invalid(reason) => {
                assert!(reason.starts_with("Session verification failed:"));
                assert!(reason.contains("browser_change"));
                assert!(reason.contains("os_change"));
            }
            SessionCheck::Valid => panic!("expected rejection"),
        }

        let entries = audit.list(&user, 10).await.unwrap();
        assert_eq!(entries[0].action, SecurityAction::SessionHijackDetected);
    }

    #[tokio::test]
    async fn test_ip_change_is_only_audited_once() {
        let (registry, audit) = registry();
        let user = Uuid::new_v4();
        registry
            .register(user, "tok", fingerprint(CHROME_MAC, Some("1.1.1.1")), Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let moved = fingerprint(CHROME_MAC, Some("2.2.2.2"));
        assert_eq!(registry.verify(user, "tok", &moved).await.unwrap(), SessionCheck::Valid);
        assert_eq!(registry.verify(user, "tok", &moved).await.unwrap(), SessionCheck::Valid);

        let entries = audit.list(&user, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, SecurityAction::SuspiciousActivity);
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let (registry, _) = registry();
        let user = Uuid::new_v4();
        registry
            .register(user, "tok", fingerprint(CHROME_MAC, None), Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        let check = registry.verify(user, "tok", &fingerprint(CHROME_MAC, None)).await.unwrap();
        assert_eq!(check, SessionCheck::Invalid("Session expired".into()));
    }

    #[tokio::test]
    async fn test_reregistering_a_token_keeps_one_index_entry() {
        let (registry, _) = registry();
        let user = Uuid::new_v4();
        let expires = Utc::now() + Duration::hours(1);
        registry.register(user, "tok", fingerprint(CHROME_MAC, None), expires).await.unwrap();
        registry.register(user, "tok", fingerprint(CHROME_MAC, None), expires).await.unwrap();

        assert_eq!(registry.list_active(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_and_revoke() {
        let (registry, _) = registry();
        let user = Uuid::new_v4();
        let expires = Utc::now() + Duration::hours(1);
        let first = registry.register(user, "one", fingerprint(CHROME_MAC, None), expires).await.unwrap();
        registry.register(user, "two", fingerprint(FIREFOX_WIN, None), expires).await.unwrap();
        registry.register(user, "three", fingerprint(SAFARI_IPHONE, None), expires).await.unwrap();
        registry
            .register(user, "old", fingerprint(CHROME_MAC, None), Utc::now() - Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(registry.list_active(user).await.unwrap().len(), 3);

        assert!(registry.revoke(user, first.id).await.unwrap());
        assert!(!registry.revoke(user, first.id).await.unwrap());
        assert_eq!(registry.list_active(user).await.unwrap().len(), 2);

        assert_eq!(registry.revoke_others(user, "two").await.unwrap(), 1);
        let remaining = registry.list_active(user).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].token_hash, hash_token("two"));
    }
}
