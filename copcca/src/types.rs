//! Common type definitions shared across the crate.
//!
//! - [`UserId`]: user account identifier (UUID)
//! - [`TeamId`]: tenant identifier; every user belongs to exactly one team
//! - [`Role`]: team-level role, `admin` or `user`
//! - [`abbrev_uuid`]: abbreviate UUIDs to first 8 chars for logging and team ids

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

pub type UserId = Uuid;
pub type TeamId = String;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Milliseconds since the Unix epoch; used for timestamp-derived ids.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
