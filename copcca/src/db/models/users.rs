//! Stored user and team documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{Role, TeamId, UserId};

/// Fields of a profile document that a profile update can never overwrite.
pub const PROTECTED_PROFILE_FIELDS: &[&str] = &[
    "id",
    "email",
    "role",
    "teamId",
    "passwordHash",
    "createdAt",
    "updatedAt",
];

fn default_status() -> String {
    "Active".to_string()
}

/// A user profile as persisted under `user:{id}`.
///
/// Unknown profile fields sent by the client (job title, avatar, preferences) are kept in
/// `extra` and round-trip untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDBResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub role: Role,
    pub team_id: TeamId,
    #[serde(default = "default_status")]
    pub status: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserDBResponse {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    /// Assigned by the caller so a new owner's team id can be derived from it
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub role: Role,
    pub team_id: TeamId,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub role: Option<Role>,
    pub password_hash: Option<String>,
    /// Free-form profile fields merged into `extra`
    pub extra: Map<String, Value>,
}

impl UserUpdateDBRequest {
    /// Build an update from a client-supplied profile object, dropping protected fields.
    pub fn from_profile_patch(mut patch: Map<String, Value>) -> Self {
        for field in PROTECTED_PROFILE_FIELDS {
            patch.remove(*field);
        }
        patch.remove("status");

        let mut take_string = |key: &str| match patch.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        let name = take_string("name");
        let phone = take_string("phone");
        let company = take_string("company");

        Self {
            name,
            phone,
            company,
            extra: patch,
            ..Default::default()
        }
    }
}

/// Filter for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub team_id: Option<TeamId>,
    pub role: Option<Role>,
}

impl UserFilter {
    pub fn team(team_id: impl Into<TeamId>) -> Self {
        Self {
            team_id: Some(team_id.into()),
            role: None,
        }
    }

    pub fn matches(&self, user: &UserDBResponse) -> bool {
        self.team_id.as_ref().is_none_or(|t| &user.team_id == t) && self.role.is_none_or(|r| user.role == r)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDBResponse {
    pub id: TeamId,
    pub name: String,
    pub admin_id: UserId,
    pub members: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}
