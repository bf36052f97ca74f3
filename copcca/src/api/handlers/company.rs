//! Company settings and team invitations.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    AppState,
    api::models::{
        company::{
            CompanySettingsResponse, GeneratedInvitationResponse, InvitationEmailRequest, InvitationEmailResponse,
            InvitationVerifyResponse,
        },
        users::CurrentUser,
    },
    auth::current_user::require_admin,
    db::{
        handlers::{Activities, CompanySettings, Invitations, Repository},
        models::{
            activities::{ActivityCreateDBRequest, Priority},
            company::company_name,
            invitations::{InvitationCreateDBRequest, InvitationDBResponse},
        },
    },
    email::{EmailService, Invitation},
    errors::{Error, Result},
    types::{Role, UserId},
    utils::{text::format_email, validation::is_valid_email},
};

async fn log_company(state: &AppState, user_id: &UserId, category: &str, action: &str, details: String, priority: Priority) {
    Activities::new(&state.store)
        .log(user_id, ActivityCreateDBRequest::new(category, action, details, priority))
        .await;
}

fn invitation_not_found(code: &str) -> Error {
    Error::NotFound {
        resource: "Invitation".to_string(),
        id: code.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/company/settings",
    tag = "company",
    responses((status = 200, description = "Company settings", body = CompanySettingsResponse)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_company_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<CompanySettingsResponse>> {
    let settings = CompanySettings::new(&state.store).get(&current_user.team_id).await?;
    Ok(Json(CompanySettingsResponse { settings }))
}

/// Merge fields into the company settings
#[utoipa::path(
    put,
    path = "/company/settings",
    tag = "company",
    request_body = Object,
    responses(
        (status = 200, description = "Merged settings", body = CompanySettingsResponse),
        (status = 403, description = "Admin access required"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_company_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(updates): Json<Map<String, Value>>,
) -> Result<Json<CompanySettingsResponse>> {
    require_admin(&current_user)?;
    let settings = CompanySettings::new(&state.store)
        .merge(&current_user.team_id, &updates, &current_user.id)
        .await?;
    let name = updates
        .get("companyName")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .unwrap_or("N/A");
    log_company(
        &state,
        &current_user.id,
        "Settings",
        "Updated company settings",
        format!("Company: {name}"),
        Priority::Medium,
    )
    .await;
    Ok(Json(CompanySettingsResponse { settings }))
}

/// Create a single-use code for joining the caller's team
#[utoipa::path(
    post,
    path = "/invitations/generate",
    tag = "company",
    responses(
        (status = 200, description = "Invitation code", body = GeneratedInvitationResponse),
        (status = 403, description = "Admin access required"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn generate_invitation(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<GeneratedInvitationResponse>> {
    require_admin(&current_user)?;

    let invitation = Invitations::new(&state.store)
        .create(&InvitationCreateDBRequest {
            email: None,
            phone: None,
            name: None,
            role: Role::User,
            created_by: current_user.id,
            team_id: current_user.team_id.clone(),
            expires_at: Utc::now() + state.config.auth.invite_expiry,
        })
        .await?;
    info!(team_id = %invitation.team_id, "Invitation generated");
    log_company(
        &state,
        &current_user.id,
        "User Management",
        "Generated invitation",
        format!("For a new {} ({})", invitation.role, invitation.code),
        Priority::Low,
    )
    .await;

    let email_service = EmailService::new(&state.config)?;
    Ok(Json(GeneratedInvitationResponse {
        success: true,
        invite_link: email_service.invite_link(&invitation.code),
        invite_code: invitation.code,
        expires_at: invitation.expires_at,
    }))
}

/// Email an invitation code
///
/// `emailConfigured` is false when no transport is set up; the code is still valid and can be
/// shared by other means.
#[utoipa::path(
    post,
    path = "/invitations/email",
    request_body = InvitationEmailRequest,
    tag = "company",
    responses(
        (status = 200, description = "Invitation processed", body = InvitationEmailResponse),
        (status = 400, description = "Bad address or unusable code"),
        (status = 404, description = "Invitation not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn email_invitation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<InvitationEmailRequest>,
) -> Result<Json<InvitationEmailResponse>> {
    require_admin(&current_user)?;

    let to = format_email(&request.email);
    if !is_valid_email(&to) {
        return Err(Error::bad_request("Invalid email address"));
    }
    let invitation = team_invitation(&state, &current_user, &request.invite_code).await?;
    let now = Utc::now();
    invitation
        .check_redeemable(now)
        .map_err(|problem| Error::bad_request(problem.message()))?;

    let settings = CompanySettings::new(&state.store).get(&current_user.team_id).await?;
    let company = company_name(&settings).unwrap_or("your team").to_string();
    let recipient = request
        .name
        .clone()
        .unwrap_or_else(|| to.split('@').next().unwrap_or_default().to_string());
    let expiry_days = (invitation.expires_at - now).num_days().max(1) as u64;

    let email_service = EmailService::new(&state.config)?;
    let sent = email_service
        .send_invitation_email(&Invitation {
            to: &to,
            recipient_name: &recipient,
            inviter_name: &current_user.name,
            company_name: &company,
            role: invitation.role,
            invite_code: &invitation.code,
            expiry_days,
        })
        .await?;
    if !sent {
        warn!(code = %invitation.code, "Email is not configured, invitation not sent");
    }
    log_company(
        &state,
        &current_user.id,
        "User Management",
        "Sent email invitation",
        format!("To {to}"),
        Priority::Low,
    )
    .await;

    Ok(Json(InvitationEmailResponse {
        success: true,
        email_configured: email_service.is_configured(),
    }))
}

async fn team_invitation(state: &AppState, current_user: &CurrentUser, code: &str) -> Result<InvitationDBResponse> {
    Invitations::new(&state.store)
        .get_by_id(code.to_string())
        .await?
        .filter(|i| i.team_id == current_user.team_id)
        .ok_or_else(|| invitation_not_found(code))
}

/// Check an invitation code before signing up
#[utoipa::path(
    get,
    path = "/invitations/verify/{code}",
    tag = "company",
    params(("code" = String, Path, description = "Invitation code")),
    responses(
        (status = 200, description = "Code is valid", body = InvitationVerifyResponse),
        (status = 400, description = "Code used or expired"),
        (status = 404, description = "Unknown code"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify_invitation(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<InvitationVerifyResponse>> {
    let invitation = Invitations::new(&state.store)
        .get_by_id(code.clone())
        .await?
        .ok_or_else(|| invitation_not_found(&code))?;
    invitation
        .check_redeemable(Utc::now())
        .map_err(|problem| Error::bad_request(problem.message()))?;

    let settings = CompanySettings::new(&state.store).get(&invitation.team_id).await?;
    Ok(Json(InvitationVerifyResponse {
        valid: true,
        company_name: company_name(&settings).map(str::to_string),
        team_id: invitation.team_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::records::ActivityListResponse,
        db::models::invitations::InvitationUpdateDBRequest,
        test_utils::{add_team_member, create_test_app, signup_user},
    };
    use axum::http::StatusCode;
    use serde_json::json;

    #[test_log::test(tokio::test)]
    async fn test_company_settings_defaults_and_merge() {
        let (server, state) = create_test_app();
        let (admin, admin_token) = signup_user(&state, "boss@duka.co.tz", Role::Admin).await;
        let (_, member_token) = add_team_member(&state, &admin, "clerk@duka.co.tz", Role::User).await;

        let response = server.get("/api/v1/company/settings").authorization_bearer(&member_token).await;
        let body: CompanySettingsResponse = response.json();
        assert_eq!(body.settings["companyName"], "");
        assert_eq!(body.settings["showCompanyName"], true);

        server
            .put("/api/v1/company/settings")
            .authorization_bearer(&member_token)
            .json(&json!({ "companyName": "Nope" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = server
            .put("/api/v1/company/settings")
            .authorization_bearer(&admin_token)
            .json(&json!({ "companyName": "Duka Bora", "logoUrl": "https://duka.co.tz/logo.png" }))
            .await;
        response.assert_status_ok();
        let body: CompanySettingsResponse = response.json();
        assert_eq!(body.settings["companyName"], "Duka Bora");
        assert_eq!(body.settings["updatedBy"], json!(admin.id));

        server
            .put("/api/v1/company/settings")
            .authorization_bearer(&admin_token)
            .json(&json!({ "showCompanyName": false }))
            .await
            .assert_status_ok();

        let response = server.get("/api/v1/activities").authorization_bearer(&admin_token).await;
        let feed: ActivityListResponse = response.json();
        let entries: Vec<(&str, &str, &str)> = feed
            .activities
            .iter()
            .map(|a| (a.category.as_str(), a.action.as_str(), a.details.as_str()))
            .collect();
        assert_eq!(
            entries,
            vec![
                ("Settings", "Updated company settings", "Company: N/A"),
                ("Settings", "Updated company settings", "Company: Duka Bora"),
            ]
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_invitation_generate_and_verify() {
        let (server, state) = create_test_app();
        let (admin, admin_token) = signup_user(&state, "boss@duka.co.tz", Role::Admin).await;
        CompanySettings::new(&state.store)
            .merge(
                &admin.team_id,
                &json!({ "companyName": "Duka Bora" }).as_object().cloned().unwrap(),
                &admin.id,
            )
            .await
            .unwrap();

        let response = server
            .post("/api/v1/invitations/generate")
            .authorization_bearer(&admin_token)
            .await;
        response.assert_status_ok();
        let generated: GeneratedInvitationResponse = response.json();
        assert!(generated.invite_code.starts_with("invite_"));
        assert!(generated.invite_link.ends_with(&format!("/signup?invite={}", generated.invite_code)));
        assert!(generated.expires_at > Utc::now() + chrono::Duration::days(6));

        let response = server
            .get(&format!("/api/v1/invitations/verify/{}", generated.invite_code))
            .await;
        response.assert_status_ok();
        let verified: InvitationVerifyResponse = response.json();
        assert!(verified.valid);
        assert_eq!(verified.team_id, admin.team_id);
        assert_eq!(verified.company_name.as_deref(), Some("Duka Bora"));

        let response = server
            .post("/api/v1/invitations/email")
            .authorization_bearer(&admin_token)
            .json(&json!({ "email": "new@duka.co.tz", "inviteCode": generated.invite_code }))
            .await;
        response.assert_status_ok();
        let emailed: InvitationEmailResponse = response.json();
        assert!(!emailed.email_configured);

        let response = server.get("/api/v1/activities").authorization_bearer(&admin_token).await;
        let feed: ActivityListResponse = response.json();
        assert_eq!(feed.activities[0].category, "User Management");
        assert_eq!(feed.activities[0].action, "Sent email invitation");
        assert_eq!(feed.activities[0].details, "To new@duka.co.tz");
        assert_eq!(feed.activities[1].action, "Generated invitation");

        Invitations::new(&state.store)
            .update(generated.invite_code.clone(), &InvitationUpdateDBRequest { used_by: admin.id })
            .await
            .unwrap();
        server
            .get(&format!("/api/v1/invitations/verify/{}", generated.invite_code))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .get("/api/v1/invitations/verify/invite_0_missing")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[test_log::test(tokio::test)]
    async fn test_invitation_email_is_team_scoped() {
        let (server, state) = create_test_app();
        let (_, admin_token) = signup_user(&state, "boss@duka.co.tz", Role::Admin).await;
        let (_, other_token) = signup_user(&state, "other@shop.co.tz", Role::Admin).await;

        let response = server
            .post("/api/v1/invitations/generate")
            .authorization_bearer(&admin_token)
            .await;
        let generated: GeneratedInvitationResponse = response.json();

        server
            .post("/api/v1/invitations/email")
            .authorization_bearer(&other_token)
            .json(&json!({ "email": "new@duka.co.tz", "inviteCode": generated.invite_code }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/api/v1/invitations/email")
            .authorization_bearer(&admin_token)
            .json(&json!({ "email": "not-an-email", "inviteCode": generated.invite_code }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
