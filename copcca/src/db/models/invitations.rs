//! Team invitation codes.

use chrono::{DateTime, Utc};
use rand::prelude::RngExt;
use rand::rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{Role, TeamId, UserId, now_ms};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `invite_{ms}_{7 base36 chars}`
pub fn generate_invite_code() -> String {
    let mut rng = rng();
    let suffix: String = (0..7)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!("invite_{}_{}", now_ms(), suffix)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationDBResponse {
    pub code: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[schema(value_type = String, format = "uuid")]
    pub created_by: UserId,
    pub team_id: TeamId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub used_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

/// Why an invitation cannot be redeemed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationProblem {
    Used,
    Expired,
}

impl InvitationProblem {
    pub fn message(&self) -> &'static str {
        match self {
            InvitationProblem::Used => "Invitation code has already been used",
            InvitationProblem::Expired => "Invitation code has expired",
        }
    }
}

impl InvitationDBResponse {
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), InvitationProblem> {
        if self.used {
            Err(InvitationProblem::Used)
        } else if self.expires_at < now {
            Err(InvitationProblem::Expired)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvitationCreateDBRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub created_by: UserId,
    pub team_id: TeamId,
    pub expires_at: DateTime<Utc>,
}

/// Marks an invitation as redeemed
#[derive(Debug, Clone)]
pub struct InvitationUpdateDBRequest {
    pub used_by: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_code_shape() {
        let code = generate_invite_code();
        let parts: Vec<&str> = code.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "invite");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 7);
        assert!(parts[2].bytes().all(|b| BASE36.contains(&b)));
    }
}
