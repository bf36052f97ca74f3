//! Team membership: listing, adding and removing users.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppState,
    api::{
        handlers::auth::{enforce_password_policy, hash_password},
        models::users::{CurrentUser, SuccessResponse, TeamMembersQuery, UserCreate, UserListResponse, UserResponse},
    },
    auth::current_user::{invalidate_profile, require_admin},
    db::{
        errors::DbError,
        handlers::{Activities, Integrations, Records, Repository, Teams, Users},
        models::{
            subscriptions::PlanName,
            users::{UserCreateDBRequest, UserDBResponse, UserFilter},
        },
    },
    errors::{Error, Result},
    security::{
        ClientInfo,
        audit::{AuditStatus, SecurityAction},
        password_validator::UserInfo,
    },
    subscriptions::{SubscriptionService, plan},
    types::{Role, UserId, abbrev_uuid},
    utils::{text::format_email, validation::is_valid_email},
};

/// Everyone on `team_id`, oldest account first.
pub(crate) async fn team_members(state: &AppState, team_id: &str) -> Result<Vec<UserDBResponse>> {
    Ok(Users::new(&state.store).list(&UserFilter::team(team_id)).await?)
}

/// Resolve a user the caller may act on behalf of: themselves, or for admins anyone on their
/// team.
pub(crate) async fn require_teammate(state: &AppState, current_user: &CurrentUser, user_id: UserId) -> Result<UserDBResponse> {
    if user_id != current_user.id {
        require_admin(current_user)?;
    }
    let user = Users::new(&state.store).get_by_id(user_id).await?;
    match user {
        Some(user) if user.team_id == current_user.team_id => Ok(user),
        _ => Err(Error::InsufficientPermissions {
            reason: "User is not a member of your team".to_string(),
        }),
    }
}

/// List the caller's team
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    responses(
        (status = 200, description = "Team members", body = UserListResponse),
        (status = 403, description = "Admin access required"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserListResponse>> {
    require_admin(&current_user)?;
    let users = team_members(&state, &current_user.team_id).await?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}

/// Add a member to the caller's team
///
/// Phone-only members log in through a synthetic `{digits}@pocketcrm.local` address.
#[utoipa::path(
    post,
    path = "/users",
    request_body = UserCreate,
    tag = "users",
    responses(
        (status = 201, description = "Member added", body = UserResponse),
        (status = 400, description = "Missing fields or weak password"),
        (status = 402, description = "Plan user limit reached"),
        (status = 409, description = "Email or phone already registered"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    client: ClientInfo,
    Json(request): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    require_admin(&current_user)?;

    let name = request.name.trim();
    let phone = request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let email = request.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    let missing_fields = || Error::bad_request("Name, phone or email, and password are required");
    if name.is_empty() || request.password.is_empty() {
        return Err(missing_fields());
    }

    let email = match (email, phone) {
        (Some(email), _) => {
            let email = format_email(email);
            if !is_valid_email(&email) {
                return Err(Error::bad_request("Invalid email address"));
            }
            email
        }
        (None, Some(phone)) => {
            let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
            if digits.is_empty() {
                return Err(Error::bad_request("Invalid phone number"));
            }
            format!("{digits}@pocketcrm.local")
        }
        (None, None) => return Err(missing_fields()),
    };

    let info = UserInfo {
        email: Some(&email),
        name: Some(name),
        company: None,
    };
    enforce_password_policy(&request.password, &info, &state.config)?;

    let subscription = SubscriptionService::new(&state.store, &state.config.subscriptions)
        .current(&current_user.team_id, Utc::now())
        .await?;
    let team_plan = plan(subscription.map(|s| s.plan).unwrap_or(PlanName::Start));
    let members = team_members(&state, &current_user.team_id).await?;
    if !team_plan.allows_users(members.len() + 1) {
        return Err(Error::PaymentRequired {
            message: "User limit reached for your plan".to_string(),
        });
    }

    let password_hash = hash_password(request.password.clone(), &state.config).await?;
    let user = Users::new(&state.store)
        .create(&UserCreateDBRequest {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email,
            phone: phone.map(str::to_string),
            company: None,
            role: request.role.unwrap_or(Role::User),
            team_id: current_user.team_id.clone(),
            password_hash,
        })
        .await
        .map_err(|e| match e {
            DbError::UniqueViolation { .. } => Error::Conflict {
                message: "A user with this email or phone already exists".to_string(),
                details: None,
            },
            other => other.into(),
        })?;
    Teams::new(&state.store).add_member(&current_user.team_id, user.id).await?;

    state
        .audit
        .record(&client, Some(user.id), SecurityAction::UserCreated, AuditStatus::Success)
        .await;
    info!(
        user_id = %abbrev_uuid(&user.id),
        team_id = %current_user.team_id,
        role = %user.role,
        "Team member added"
    );
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Remove a member and everything they own
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = SuccessResponse),
        (status = 400, description = "Cannot delete yourself"),
        (status = 403, description = "Not an admin of the user's team"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    client: ClientInfo,
    Path(user_id): Path<UserId>,
) -> Result<Json<SuccessResponse>> {
    require_admin(&current_user)?;
    if user_id == current_user.id {
        return Err(Error::bad_request("You cannot delete your own account"));
    }
    let user = require_teammate(&state, &current_user, user_id).await?;

    Records::new(&state.store).delete_all(&user.id).await?;
    Activities::new(&state.store).delete_all(&user.id).await?;
    Integrations::new(&state.store).delete_all(&user.id).await?;
    Users::new(&state.store).delete(user.id).await?;
    state.sessions.revoke_all(user.id).await?;
    invalidate_profile(&user.id).await;

    state
        .audit
        .record(&client, Some(user.id), SecurityAction::UserDeleted, AuditStatus::Success)
        .await;
    info!(user_id = %abbrev_uuid(&user.id), deleted_by = %abbrev_uuid(&current_user.id), "User deleted");
    Ok(Json(SuccessResponse::ok()))
}

/// Members of the caller's team
#[utoipa::path(
    get,
    path = "/team/members",
    tag = "users",
    params(("teamId" = Option<String>, Query, description = "Must be the caller's team")),
    responses(
        (status = 200, description = "Team members", body = UserListResponse),
        (status = 403, description = "Another team was requested"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_team_members(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<TeamMembersQuery>,
) -> Result<Json<UserListResponse>> {
    if query.team_id.as_ref().is_some_and(|t| t != &current_user.team_id) {
        return Err(Error::InsufficientPermissions {
            reason: "You can only view members of your own team".to_string(),
        });
    }
    let users = team_members(&state, &current_user.team_id).await?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}
