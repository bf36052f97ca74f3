//! Company settings and invitation models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::types::TeamId;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanySettingsResponse {
    #[schema(value_type = Object)]
    pub settings: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedInvitationResponse {
    pub success: bool,
    pub invite_code: String,
    pub invite_link: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationEmailRequest {
    pub email: String,
    pub invite_code: String,
    /// Greeting name; defaults to the local part of the address
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationEmailResponse {
    pub success: bool,
    /// False when no email transport is configured and nothing was sent
    pub email_configured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationVerifyResponse {
    pub valid: bool,
    pub team_id: TeamId,
    pub company_name: Option<String>,
}
