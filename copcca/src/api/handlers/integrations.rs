//! Third-party integrations, kept as one list per user.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::users::require_teammate,
        models::{
            records::{IntegrationListResponse, IntegrationResponse, IntegrationsQuery},
            users::{CurrentUser, SuccessResponse},
        },
    },
    db::{
        errors::DbError,
        handlers::{Activities, Integrations},
        models::{
            activities::{ActivityCreateDBRequest, Priority},
            integrations::{Integration, integration_name},
        },
    },
    errors::{Error, Result},
    types::UserId,
};

async fn target_owner(state: &AppState, current_user: &CurrentUser, query: &IntegrationsQuery) -> Result<UserId> {
    match query.user_id {
        Some(user_id) if user_id != current_user.id => Ok(require_teammate(state, current_user, user_id).await?.id),
        _ => Ok(current_user.id),
    }
}

fn integration_not_found(id: &str) -> impl FnOnce(DbError) -> Error + '_ {
    move |e| match e {
        DbError::NotFound => Error::NotFound {
            resource: "Integration".to_string(),
            id: id.to_string(),
        },
        other => other.into(),
    }
}

async fn log_integration(state: &AppState, owner: &UserId, action: &str, details: String, priority: Priority) {
    Activities::new(&state.store)
        .log(owner, ActivityCreateDBRequest::new("Integration", action, details, priority))
        .await;
}

#[utoipa::path(
    get,
    path = "/integrations",
    tag = "integrations",
    params(IntegrationsQuery),
    responses((status = 200, description = "Integrations", body = IntegrationListResponse)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_integrations(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<IntegrationsQuery>,
) -> Result<Json<IntegrationListResponse>> {
    let owner = target_owner(&state, &current_user, &query).await?;
    let integrations = Integrations::new(&state.store).list(&owner).await?;
    Ok(Json(IntegrationListResponse { integrations }))
}

/// Connect an integration
///
/// A string `id` sent by the client is kept; otherwise one is generated.
#[utoipa::path(
    post,
    path = "/integrations",
    tag = "integrations",
    params(IntegrationsQuery),
    request_body = Object,
    responses(
        (status = 201, description = "Integration connected", body = IntegrationResponse),
        (status = 409, description = "An integration with that id exists"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_integration(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<IntegrationsQuery>,
    Json(integration): Json<Integration>,
) -> Result<(StatusCode, Json<IntegrationResponse>)> {
    let owner = target_owner(&state, &current_user, &query).await?;
    let integration = Integrations::new(&state.store).create(&owner, integration).await?;
    log_integration(
        &state,
        &owner,
        "Connected integration",
        integration_name(&integration),
        Priority::Medium,
    )
    .await;
    Ok((StatusCode::CREATED, Json(IntegrationResponse { integration })))
}

#[utoipa::path(
    put,
    path = "/integrations/{id}",
    tag = "integrations",
    params(("id" = String, Path, description = "Integration id"), IntegrationsQuery),
    request_body = Object,
    responses(
        (status = 200, description = "Updated integration", body = IntegrationResponse),
        (status = 404, description = "Integration not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_integration(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<IntegrationsQuery>,
    Json(updates): Json<Integration>,
) -> Result<Json<IntegrationResponse>> {
    let owner = target_owner(&state, &current_user, &query).await?;
    let integration = Integrations::new(&state.store)
        .update(&owner, &id, &updates)
        .await
        .map_err(integration_not_found(&id))?;
    log_integration(
        &state,
        &owner,
        "Updated integration",
        integration_name(&integration),
        Priority::Low,
    )
    .await;
    Ok(Json(IntegrationResponse { integration }))
}

/// Mark an integration as freshly synced
#[utoipa::path(
    post,
    path = "/integrations/{id}/sync",
    tag = "integrations",
    params(("id" = String, Path, description = "Integration id"), IntegrationsQuery),
    responses(
        (status = 200, description = "Synced integration", body = IntegrationResponse),
        (status = 404, description = "Integration not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn sync_integration(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<IntegrationsQuery>,
) -> Result<Json<IntegrationResponse>> {
    let owner = target_owner(&state, &current_user, &query).await?;
    let integration = Integrations::new(&state.store)
        .sync(&owner, &id)
        .await
        .map_err(integration_not_found(&id))?;
    log_integration(
        &state,
        &owner,
        "Synced integration",
        integration_name(&integration),
        Priority::Low,
    )
    .await;
    Ok(Json(IntegrationResponse { integration }))
}

#[utoipa::path(
    delete,
    path = "/integrations/{id}",
    tag = "integrations",
    params(("id" = String, Path, description = "Integration id"), IntegrationsQuery),
    responses(
        (status = 200, description = "Integration disconnected", body = SuccessResponse),
        (status = 404, description = "Integration not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_integration(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<IntegrationsQuery>,
) -> Result<Json<SuccessResponse>> {
    let owner = target_owner(&state, &current_user, &query).await?;
    let removed = Integrations::new(&state.store)
        .delete(&owner, &id)
        .await
        .map_err(integration_not_found(&id))?;

    let name = integration_name(&removed);
    let details = if name.is_empty() { id.clone() } else { name };
    log_integration(&state, &owner, "Disconnected integration", details, Priority::Medium).await;
    Ok(Json(SuccessResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::records::ActivityListResponse,
        test_utils::{add_team_member, create_test_app, signup_user},
        types::Role,
    };
    use serde_json::json;

    #[test_log::test(tokio::test)]
    async fn test_integration_lifecycle() {
        let (server, state) = create_test_app();
        let (_, token) = signup_user(&state, "asha@duka.co.tz", Role::User).await;

        let response = server
            .post("/api/v1/integrations")
            .authorization_bearer(&token)
            .json(&json!({ "name": "QuickBooks", "status": "pending" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: IntegrationResponse = response.json();
        let id = created.integration["id"].as_str().unwrap().to_string();
        assert!(id.starts_with("int-"));

        let response = server
            .post(&format!("/api/v1/integrations/{id}/sync"))
            .authorization_bearer(&token)
            .await;
        response.assert_status_ok();
        let synced: IntegrationResponse = response.json();
        assert_eq!(synced.integration["status"], "connected");
        assert!(synced.integration.contains_key("lastSync"));

        let response = server
            .put(&format!("/api/v1/integrations/{id}"))
            .authorization_bearer(&token)
            .json(&json!({ "apiKeyHint": "****1234" }))
            .await;
        let updated: IntegrationResponse = response.json();
        assert_eq!(updated.integration["name"], "QuickBooks");
        assert_eq!(updated.integration["apiKeyHint"], "****1234");

        server
            .delete(&format!("/api/v1/integrations/{id}"))
            .authorization_bearer(&token)
            .await
            .assert_status_ok();
        server
            .post(&format!("/api/v1/integrations/{id}/sync"))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let response = server.get("/api/v1/activities").authorization_bearer(&token).await;
        let feed: ActivityListResponse = response.json();
        let actions: Vec<&str> = feed.activities.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(
            actions,
            vec![
                "Disconnected integration",
                "Updated integration",
                "Synced integration",
                "Connected integration"
            ]
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_admin_manages_teammate_integrations() {
        let (server, state) = create_test_app();
        let (admin, admin_token) = signup_user(&state, "boss@duka.co.tz", Role::Admin).await;
        let (member, member_token) = add_team_member(&state, &admin, "clerk@duka.co.tz", Role::User).await;

        server
            .post("/api/v1/integrations")
            .authorization_bearer(&admin_token)
            .add_query_param("userId", member.id)
            .json(&json!({ "id": "mpesa", "name": "M-Pesa" }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.get("/api/v1/integrations").authorization_bearer(&member_token).await;
        let list: IntegrationListResponse = response.json();
        assert_eq!(list.integrations.len(), 1);
        assert_eq!(list.integrations[0]["id"], "mpesa");

        server
            .get("/api/v1/integrations")
            .authorization_bearer(&member_token)
            .add_query_param("userId", admin.id)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
