//! The caller's own profile, sessions and security trail.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    AppState,
    api::{
        handlers::users::require_teammate,
        models::{
            security::{AuditListResponse, AuditQuery, RevokeSessionsResponse, SessionInfo, SessionListResponse},
            users::{CurrentUser, ProfileResponse, SuccessResponse},
        },
    },
    auth::current_user::invalidate_profile,
    db::{
        handlers::{Repository, Users},
        models::users::UserUpdateDBRequest,
    },
    errors::{Error, Result},
    security::{
        ClientInfo,
        audit::{AuditStatus, SecurityAction},
        fingerprint::hash_token,
    },
};

const DEFAULT_AUDIT_LIMIT: usize = 50;

/// Get the caller's profile
#[utoipa::path(
    get,
    path = "/profile",
    tag = "profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_profile(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ProfileResponse>> {
    let user = Users::new(&state.store)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: current_user.id.to_string(),
        })?;
    Ok(Json(ProfileResponse { user: user.into() }))
}

/// Update the caller's profile
///
/// Any JSON object is accepted. `id`, `email`, `role` and `teamId` are never overwritten.
#[utoipa::path(
    put,
    path = "/profile",
    tag = "profile",
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
    client: ClientInfo,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<ProfileResponse>> {
    let request = UserUpdateDBRequest::from_profile_patch(patch);
    let user = Users::new(&state.store).update(current_user.id, &request).await?;
    invalidate_profile(&current_user.id).await;

    state
        .audit
        .record(&client, Some(current_user.id), SecurityAction::ProfileUpdate, AuditStatus::Success)
        .await;
    Ok(Json(ProfileResponse { user: user.into() }))
}

/// List the caller's active sessions
#[utoipa::path(
    get,
    path = "/sessions",
    tag = "profile",
    responses(
        (status = 200, description = "Active sessions, most recent first", body = SessionListResponse),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_sessions(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<SessionListResponse>> {
    let current_hash = hash_token(&current_user.token);
    let sessions = state
        .sessions
        .list_active(current_user.id)
        .await?
        .into_iter()
        .map(|record| SessionInfo::from_record(record, &current_hash))
        .collect();
    Ok(Json(SessionListResponse { sessions }))
}

/// Revoke every session except the current one
#[utoipa::path(
    delete,
    path = "/sessions",
    tag = "profile",
    responses(
        (status = 200, description = "Other sessions revoked", body = RevokeSessionsResponse),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn revoke_other_sessions(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<RevokeSessionsResponse>> {
    let revoked = state.sessions.revoke_others(current_user.id, &current_user.token).await?;
    Ok(Json(RevokeSessionsResponse { success: true, revoked }))
}

/// Revoke one session
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    tag = "profile",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session revoked", body = SuccessResponse),
        (status = 404, description = "No such session"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn revoke_session(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SuccessResponse>> {
    if !state.sessions.revoke(current_user.id, session_id).await? {
        return Err(Error::NotFound {
            resource: "Session".to_string(),
            id: session_id.to_string(),
        });
    }
    Ok(Json(SuccessResponse::ok()))
}

/// Read the security audit trail
///
/// Callers see their own entries. Admins may pass `userId` for a member of their team.
#[utoipa::path(
    get,
    path = "/security/audit",
    tag = "profile",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries, newest first", body = AuditListResponse),
        (status = 403, description = "Not allowed to read that user's trail"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_audit_entries(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditListResponse>> {
    let target = match query.user_id {
        Some(user_id) if user_id != current_user.id => require_teammate(&state, &current_user, user_id).await?.id,
        _ => current_user.id,
    };

    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    let entries = state.audit.list(&target, limit).await?;
    Ok(Json(AuditListResponse { entries }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{add_team_member, create_test_app, open_test_session, signup_user},
        types::Role,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    #[test_log::test(tokio::test)]
    async fn test_profile_update_keeps_protected_fields() {
        let (server, state) = create_test_app();
        let (user, token) = signup_user(&state, "asha@duka.co.tz", Role::User).await;

        let response = server
            .put("/api/v1/profile")
            .authorization_bearer(&token)
            .json(&json!({
                "name": "Asha M.",
                "role": "admin",
                "email": "evil@example.com",
                "teamId": "team-other",
                "jobTitle": "Sales lead",
            }))
            .await;
        response.assert_status_ok();
        let body: ProfileResponse = response.json();
        assert_eq!(body.user.name, "Asha M.");
        assert_eq!(body.user.role, Role::User);
        assert_eq!(body.user.email, "asha@duka.co.tz");
        assert_eq!(body.user.team_id, user.team_id);
        assert_eq!(body.user.preferences["jobTitle"], "Sales lead");

        let response = server.get("/api/v1/profile").authorization_bearer(&token).await;
        let body: ProfileResponse = response.json();
        assert_eq!(body.user.name, "Asha M.");

        let entries = state.audit.list(&user.id, 10).await.unwrap();
        assert!(entries.iter().any(|e| e.action == SecurityAction::ProfileUpdate));
    }

    #[test_log::test(tokio::test)]
    async fn test_profile_requires_session() {
        let (server, _state) = create_test_app();
        server.get("/api/v1/profile").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_sessions_list_and_revoke() {
        let (server, state) = create_test_app();
        let (user, token) = signup_user(&state, "salim@duka.co.tz", Role::User).await;
        let second = open_test_session(&state, &user).await;

        let response = server.get("/api/v1/sessions").authorization_bearer(&token).await;
        response.assert_status_ok();
        let body: SessionListResponse = response.json();
        assert_eq!(body.sessions.len(), 2);
        assert_eq!(body.sessions.iter().filter(|s| s.current).count(), 1);

        let response = server.delete("/api/v1/sessions").authorization_bearer(&token).await;
        let revoked: RevokeSessionsResponse = response.json();
        assert_eq!(revoked.revoked, 1);

        server
            .get("/api/v1/profile")
            .authorization_bearer(&second)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = server.get("/api/v1/sessions").authorization_bearer(&token).await;
        let body: SessionListResponse = response.json();
        let current = body.sessions[0].id;

        server
            .delete(&format!("/api/v1/sessions/{}", Uuid::new_v4()))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete(&format!("/api/v1/sessions/{current}"))
            .authorization_bearer(&token)
            .await
            .assert_status_ok();
        server
            .get("/api/v1/profile")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_audit_trail_access() {
        let (server, state) = create_test_app();
        let (admin, admin_token) = signup_user(&state, "boss@duka.co.tz", Role::Admin).await;
        let (member, member_token) = add_team_member(&state, &admin, "clerk@duka.co.tz", Role::User).await;
        let (outsider, _) = signup_user(&state, "other@shop.co.tz", Role::Admin).await;

        server
            .put("/api/v1/profile")
            .authorization_bearer(&member_token)
            .json(&json!({ "name": "Clerk" }))
            .await
            .assert_status_ok();

        let response = server
            .get("/api/v1/security/audit")
            .authorization_bearer(&admin_token)
            .add_query_param("userId", member.id)
            .await;
        response.assert_status_ok();
        let body: AuditListResponse = response.json();
        assert_eq!(body.entries.len(), 1);

        server
            .get("/api/v1/security/audit")
            .authorization_bearer(&member_token)
            .add_query_param("userId", admin.id)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .get("/api/v1/security/audit")
            .authorization_bearer(&admin_token)
            .add_query_param("userId", outsider.id)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
