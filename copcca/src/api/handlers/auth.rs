use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        auth::{
            AuthResponse, GeneratePasswordQuery, GeneratedPasswordResponse, LoginRequest, LogoutResponse, MessageResponse,
            PasswordResetRequest, PasswordStrengthRequest, PasswordStrengthResponse, SessionResponse, SignupRequest,
            UpdatePasswordRequest, VerifyResetTokenRequest, VerifyResetTokenResponse,
        },
        users::CurrentUser,
    },
    auth::{current_user::invalidate_profile, password, session},
    config::Config,
    db::{
        errors::DbError,
        handlers::{Invitations, PasswordResetTokens, Repository, Teams, Users, password_reset_tokens::PasswordResetTokenUse},
        models::{
            invitations::InvitationUpdateDBRequest,
            password_reset_tokens::{PasswordResetTokenCreateDBRequest, PasswordResetTokenDBResponse},
            users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
        },
    },
    email::EmailService,
    errors::{Error, Result},
    security::{
        ClientInfo,
        audit::{AuditStatus, SecurityAction},
        password_validator::{
            PasswordRequirements, UserInfo, generate_strong_password, strength_label, validate_password,
        },
    },
    subscriptions::SubscriptionService,
    types::{Role, abbrev_uuid},
    utils::{text::format_email, validation::is_valid_email},
};

/// Password policy with the configured minimum length.
pub(crate) fn password_requirements(config: &Config) -> PasswordRequirements {
    PasswordRequirements {
        min_length: config.auth.password.min_length,
        ..Default::default()
    }
}

/// Run the password policy, turning violations into a 400.
pub(crate) fn enforce_password_policy(password: &str, info: &UserInfo<'_>, config: &Config) -> Result<()> {
    let validation = validate_password(password, Some(info), &password_requirements(config));
    if validation.is_valid {
        Ok(())
    } else {
        Err(Error::bad_request(validation.errors.join(". ")))
    }
}

/// Hash on a blocking thread to avoid stalling the async runtime.
pub(crate) async fn hash_password(password: String, config: &Config) -> Result<String> {
    let password_config = config.auth.password.clone();
    tokio::task::spawn_blocking(move || password::hash_password(&password, &password_config))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?
}

/// Values starting with `+` are phone numbers and log in through a synthetic address.
/// Returns the account email and, for phones, the phone number.
fn resolve_identifier(phone_or_email: &str) -> (String, Option<String>) {
    let value = phone_or_email.trim();
    if value.starts_with('+') {
        let digits: String = value.chars().filter(char::is_ascii_digit).collect();
        (format!("{digits}@pocket.internal"), Some(value.to_string()))
    } else {
        (format_email(value), None)
    }
}

fn already_registered(is_phone: bool) -> Error {
    let what = if is_phone { "phone number" } else { "email" };
    Error::Conflict {
        message: format!("This {what} is already registered. Please login instead."),
        details: Some(serde_json::json!({ "userExists": true })),
    }
}

/// Sign a token for `user`, remember the device that asked for it and build the cookie.
async fn open_session(state: &AppState, user: &UserDBResponse, client: &ClientInfo) -> Result<(String, String)> {
    let (token, claims) = session::create_session_token(&CurrentUser::from(user), &state.config)?;
    state
        .sessions
        .register(user.id, &token, client.fingerprint.clone(), claims.expires_at())
        .await?;
    let cookie = session::session_cookie(&token, &state.config);
    Ok((token, cookie))
}

/// Create an account
///
/// Without an invitation the new user becomes the admin of a fresh team on a trial
/// subscription. With one, they join the inviting team as a regular user.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Missing fields, weak password or bad invitation"),
        (status = 409, description = "Already registered"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(request): Json<SignupRequest>,
) -> Result<SessionResponse> {
    let name = request.name.trim();
    if name.is_empty() || request.phone_or_email.trim().is_empty() || request.password.is_empty() {
        return Err(Error::bad_request("Name, phone/email, and password are required"));
    }

    let (email, phone) = resolve_identifier(&request.phone_or_email);
    let is_phone = phone.is_some();
    if !is_phone && !is_valid_email(&email) {
        return Err(Error::bad_request("Invalid email address"));
    }

    let info = UserInfo {
        email: Some(&email),
        name: Some(name),
        company: request.company.as_deref(),
    };
    enforce_password_policy(&request.password, &info, &state.config)?;

    let mut users = Users::new(&state.store);
    if users.email_taken(&email).await? {
        return Err(already_registered(is_phone));
    }

    let invitation = match request.invite_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => {
            let invitation = Invitations::new(&state.store)
                .get_by_id(code.to_string())
                .await?
                .ok_or_else(|| Error::bad_request("Invalid or expired invitation code"))?;
            invitation
                .check_redeemable(Utc::now())
                .map_err(|problem| Error::bad_request(problem.message()))?;
            Some(invitation)
        }
        None => None,
    };

    let id = Uuid::new_v4();
    let (team_id, role) = match &invitation {
        Some(invitation) => (invitation.team_id.clone(), Role::User),
        None => (format!("team-{}", abbrev_uuid(&id)), Role::Admin),
    };

    let password_hash = hash_password(request.password.clone(), &state.config).await?;
    let user = users
        .create(&UserCreateDBRequest {
            id,
            name: name.to_string(),
            email,
            phone,
            company: request.company.clone().filter(|c| !c.trim().is_empty()),
            role,
            team_id: team_id.clone(),
            password_hash,
        })
        .await
        .map_err(|e| match e {
            DbError::UniqueViolation { .. } => already_registered(is_phone),
            other => other.into(),
        })?;

    let mut teams = Teams::new(&state.store);
    match invitation {
        Some(invitation) => {
            teams.add_member(&team_id, user.id).await?;
            Invitations::new(&state.store)
                .update(invitation.code, &InvitationUpdateDBRequest { used_by: user.id })
                .await?;
        }
        None => {
            teams.create(&team_id, &format!("{name}'s Team"), user.id).await?;
            SubscriptionService::new(&state.store, &state.config.subscriptions)
                .start_trial(&team_id, Utc::now())
                .await?;
        }
    }

    state
        .audit
        .record(&client, Some(user.id), SecurityAction::UserCreated, AuditStatus::Success)
        .await;
    let (token, cookie) = open_session(&state, &user, &client).await?;
    info!(user_id = %abbrev_uuid(&user.id), %team_id, %role, "User signed up");

    Ok(SessionResponse {
        status: StatusCode::CREATED,
        body: AuthResponse {
            success: true,
            user: user.into(),
            token,
        },
        cookie,
    })
}

/// Log in with phone or email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(request): Json<LoginRequest>,
) -> Result<SessionResponse> {
    if request.phone_or_email.trim().is_empty() || request.password.is_empty() {
        return Err(Error::bad_request("Phone/email and password are required"));
    }

    let (email, _) = resolve_identifier(&request.phone_or_email);
    let identifier_key = format!("login:{email}");
    let ip_key = format!("login-ip:{}", client.ip);
    state.rate_limiter.ensure_not_blocked(&identifier_key)?;
    state.rate_limiter.ensure_not_blocked(&ip_key)?;

    let user = Users::new(&state.store).get_user_by_email(&email).await?;
    let verified = match &user {
        Some(user) => verify_password(request.password.clone(), user.password_hash.clone()).await?,
        None => false,
    };

    if !verified {
        let user_id = user.as_ref().map(|u| u.id);
        let identifier_allowed = state.rate_limiter.record_failed_attempt(&identifier_key);
        let ip_allowed = state.rate_limiter.record_failed_attempt(&ip_key);
        state
            .audit
            .record(&client, user_id, SecurityAction::LoginFailed, AuditStatus::Failed)
            .await;

        if !identifier_allowed {
            state.rate_limiter.ensure_not_blocked(&identifier_key)?;
        }
        if !ip_allowed {
            state.rate_limiter.ensure_not_blocked(&ip_key)?;
        }
        return Err(Error::Unauthenticated {
            message: Some("Invalid credentials".to_string()),
        });
    }
    let Some(user) = user else {
        return Err(Error::Unauthenticated {
            message: Some("Invalid credentials".to_string()),
        });
    };

    state.rate_limiter.reset(&identifier_key);
    let (token, cookie) = open_session(&state, &user, &client).await?;
    state
        .audit
        .record(&client, Some(user.id), SecurityAction::Login, AuditStatus::Success)
        .await;

    Ok(SessionResponse {
        status: StatusCode::OK,
        body: AuthResponse {
            success: true,
            user: user.into(),
            token,
        },
        cookie,
    })
}

/// End the current session
///
/// Always clears the cookie; a still-valid session is also revoked server side.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    client: ClientInfo,
    current_user: Option<CurrentUser>,
) -> Result<LogoutResponse> {
    if let Some(user) = current_user {
        state.sessions.revoke_token(user.id, &user.token).await?;
        state
            .audit
            .record(&client, Some(user.id), SecurityAction::Logout, AuditStatus::Success)
            .await;
    }

    Ok(LogoutResponse {
        body: MessageResponse::new("Logged out successfully"),
        cookie: session::expired_session_cookie(&state.config),
    })
}

/// Request a password reset link
///
/// Answers the same way whether or not the account exists.
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = PasswordResetRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse),
        (status = 429, description = "Too many attempts"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(request): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>> {
    let email = format_email(&request.email);
    if email.is_empty() {
        return Err(Error::bad_request("Email is required"));
    }
    state.rate_limiter.check_rate_limit(&format!("reset:{email}"))?;
    state.rate_limiter.check_rate_limit(&format!("reset-ip:{}", client.ip))?;

    if let Some(user) = Users::new(&state.store).get_user_by_email(&email).await? {
        let raw_token = password::generate_reset_token();
        let expiry = state.config.auth.password_reset_expiry;
        PasswordResetTokens::new(&state.store)
            .create(&PasswordResetTokenCreateDBRequest {
                user_id: user.id,
                email: user.email.clone(),
                raw_token: raw_token.clone(),
                expires_at: Utc::now() + expiry,
            })
            .await?;

        let email_service = EmailService::new(&state.config)?;
        if let Err(e) = email_service
            .send_password_reset_email(&user.email, Some(&user.name), &raw_token, expiry.as_secs() / 60)
            .await
        {
            warn!(user_id = %abbrev_uuid(&user.id), "Failed to send password reset email: {}", e);
        }
        state
            .audit
            .record(&client, Some(user.id), SecurityAction::PasswordResetRequest, AuditStatus::Success)
            .await;
    }

    Ok(Json(MessageResponse::new(
        "If an account with that email exists, a password reset link has been sent.",
    )))
}

/// Load a reset token that can still be redeemed. Expired tokens are deleted on sight.
async fn redeemable_token(state: &AppState, raw_token: &str) -> Result<PasswordResetTokenDBResponse> {
    if raw_token.is_empty() {
        return Err(Error::bad_request("Reset token is required"));
    }

    let mut tokens = PasswordResetTokens::new(&state.store);
    let token = tokens
        .get_by_id(raw_token.to_string())
        .await?
        .ok_or_else(|| Error::bad_request("Invalid or expired reset token"))?;

    if token.used {
        return Err(Error::bad_request("This reset token has already been used"));
    }
    if token.expires_at < Utc::now() {
        tokens.delete(raw_token.to_string()).await?;
        return Err(Error::bad_request("Reset token has expired"));
    }
    Ok(token)
}

/// Check a reset token before showing the new-password form
#[utoipa::path(
    post,
    path = "/auth/verify-reset-token",
    request_body = VerifyResetTokenRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Token is valid", body = VerifyResetTokenResponse),
        (status = 400, description = "Unknown, used or expired token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify_reset_token(
    State(state): State<AppState>,
    Json(request): Json<VerifyResetTokenRequest>,
) -> Result<Json<VerifyResetTokenResponse>> {
    let token = redeemable_token(&state, &request.token).await?;
    Ok(Json(VerifyResetTokenResponse {
        valid: true,
        email: token.email,
    }))
}

/// Set a new password with a reset token
///
/// Every existing session of the account is revoked.
#[utoipa::path(
    post,
    path = "/auth/update-password",
    request_body = UpdatePasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Bad token or weak password"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_password(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let token = redeemable_token(&state, &request.token).await?;

    let mut users = Users::new(&state.store);
    let user = users.get_by_id(token.user_id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: token.user_id.to_string(),
    })?;

    let info = UserInfo {
        email: Some(&user.email),
        name: Some(&user.name),
        company: user.company.as_deref(),
    };
    enforce_password_policy(&request.password, &info, &state.config)?;

    let password_hash = hash_password(request.password.clone(), &state.config).await?;
    users
        .update(
            user.id,
            &UserUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;
    PasswordResetTokens::new(&state.store)
        .update(request.token.clone(), &PasswordResetTokenUse)
        .await?;

    state.sessions.revoke_all(user.id).await?;
    invalidate_profile(&user.id).await;
    state
        .audit
        .record(&client, Some(user.id), SecurityAction::PasswordResetComplete, AuditStatus::Success)
        .await;

    Ok(Json(MessageResponse::new("Password updated successfully")))
}

/// Score a candidate password
#[utoipa::path(
    post,
    path = "/auth/password-strength",
    request_body = PasswordStrengthRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Validation result", body = PasswordStrengthResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn password_strength(
    State(state): State<AppState>,
    Json(request): Json<PasswordStrengthRequest>,
) -> Json<PasswordStrengthResponse> {
    let info = UserInfo {
        email: request.email.as_deref(),
        name: request.name.as_deref(),
        company: request.company.as_deref(),
    };
    let result = validate_password(&request.password, Some(&info), &password_requirements(&state.config));

    Json(PasswordStrengthResponse {
        is_valid: result.is_valid,
        label: strength_label(result.strength).to_string(),
        strength: result.strength,
        score: result.score,
        errors: result.errors,
        suggestions: result.suggestions,
    })
}

/// Generate a random password that passes the policy
#[utoipa::path(
    get,
    path = "/auth/password/generate",
    params(GeneratePasswordQuery),
    tag = "authentication",
    responses(
        (status = 200, description = "Generated password", body = GeneratedPasswordResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn generate_password(Query(query): Query<GeneratePasswordQuery>) -> Json<GeneratedPasswordResponse> {
    let length = query.length.unwrap_or(16).clamp(12, 128);
    Json(GeneratedPasswordResponse {
        password: generate_strong_password(length),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            handlers::Subscriptions,
            models::{invitations::InvitationCreateDBRequest, subscriptions::SubscriptionStatus},
        },
        test_utils::{STRONG_PASSWORD, create_test_app, signup_user},
    };
    use chrono::Duration;
    use serde_json::{Value, json};

    #[test_log::test(tokio::test)]
    async fn test_signup_creates_team_and_trial() {
        let (server, state) = create_test_app();

        let response = server
            .post("/api/v1/auth/signup")
            .json(&json!({
                "name": "Amina Juma",
                "phoneOrEmail": " Amina@Duka.co.tz ",
                "password": STRONG_PASSWORD,
                "company": "Duka Bora",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert!(response.headers().get("set-cookie").is_some());
        let body: AuthResponse = response.json();
        assert!(body.success);
        assert!(!body.token.is_empty());
        assert_eq!(body.user.email, "amina@duka.co.tz");
        assert_eq!(body.user.role, Role::Admin);
        assert_eq!(body.user.team_id, format!("team-{}", abbrev_uuid(&body.user.id)));

        let team = Teams::new(&state.store).get(&body.user.team_id).await.unwrap().unwrap();
        assert_eq!(team.name, "Amina Juma's Team");
        assert_eq!(team.members, vec![body.user.id]);

        let subscription = Subscriptions::new(&state.store)
            .get(&body.user.team_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subscription.status, SubscriptionStatus::Trial);
    }

    #[test_log::test(tokio::test)]
    async fn test_phone_signup_and_duplicate() {
        let (server, _state) = create_test_app();
        let body = json!({
            "name": "Baraka",
            "phoneOrEmail": "+255712345678",
            "password": STRONG_PASSWORD,
        });

        let response = server.post("/api/v1/auth/signup").json(&body).await;
        response.assert_status(StatusCode::CREATED);
        let created: AuthResponse = response.json();
        assert_eq!(created.user.email, "255712345678@pocket.internal");
        assert_eq!(created.user.phone.as_deref(), Some("+255712345678"));

        let response = server.post("/api/v1/auth/signup").json(&body).await;
        response.assert_status(StatusCode::CONFLICT);
        let error: Value = response.json();
        assert_eq!(
            error["error"],
            "This phone number is already registered. Please login instead."
        );
        assert_eq!(error["userExists"], true);
    }

    #[test_log::test(tokio::test)]
    async fn test_signup_validation() {
        let (server, _state) = create_test_app();

        let response = server
            .post("/api/v1/auth/signup")
            .json(&json!({ "name": "", "phoneOrEmail": "x@y.com", "password": STRONG_PASSWORD }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/v1/auth/signup")
            .json(&json!({ "name": "Neema", "phoneOrEmail": "neema@duka.co.tz", "password": "short" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: Value = response.json();
        assert!(error["error"].as_str().unwrap().contains("at least 12 characters"));
    }

    #[test_log::test(tokio::test)]
    async fn test_signup_with_invitation_joins_team() {
        let (server, state) = create_test_app();
        let (admin, _) = signup_user(&state, "owner@duka.co.tz", Role::Admin).await;

        let invitation = Invitations::new(&state.store)
            .create(&InvitationCreateDBRequest {
                email: None,
                phone: None,
                name: None,
                role: Role::Admin,
                created_by: admin.id,
                team_id: admin.team_id.clone(),
                expires_at: Utc::now() + Duration::days(7),
            })
            .await
            .unwrap();

        let response = server
            .post("/api/v1/auth/signup")
            .json(&json!({
                "name": "Joyce",
                "phoneOrEmail": "joyce@duka.co.tz",
                "password": STRONG_PASSWORD,
                "inviteCode": invitation.code,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: AuthResponse = response.json();
        assert_eq!(body.user.team_id, admin.team_id);
        assert_eq!(body.user.role, Role::User);

        let stored = Invitations::new(&state.store)
            .get_by_id(invitation.code.clone())
            .await
            .unwrap()
            .unwrap();
        assert!(stored.used);
        assert_eq!(stored.used_by, Some(body.user.id));

        let response = server
            .post("/api/v1/auth/signup")
            .json(&json!({
                "name": "Another",
                "phoneOrEmail": "another@duka.co.tz",
                "password": STRONG_PASSWORD,
                "inviteCode": invitation.code,
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: Value = response.json();
        assert_eq!(error["error"], "Invitation code has already been used");

        let response = server
            .post("/api/v1/auth/signup")
            .json(&json!({
                "name": "Another",
                "phoneOrEmail": "another@duka.co.tz",
                "password": STRONG_PASSWORD,
                "inviteCode": "invite_0_missing",
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn test_login_and_lockout() {
        let (server, state) = create_test_app();
        signup_user(&state, "mussa@duka.co.tz", Role::Admin).await;

        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({ "phoneOrEmail": "MUSSA@duka.co.tz", "password": STRONG_PASSWORD }))
            .await;
        response.assert_status_ok();
        let body: AuthResponse = response.json();
        server
            .get("/api/v1/profile")
            .authorization_bearer(&body.token)
            .await
            .assert_status_ok();

        for _ in 0..5 {
            server
                .post("/api/v1/auth/login")
                .json(&json!({ "phoneOrEmail": "mussa@duka.co.tz", "password": "wrong-password" }))
                .await
                .assert_status(StatusCode::UNAUTHORIZED);
        }
        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({ "phoneOrEmail": "mussa@duka.co.tz", "password": "wrong-password" }))
            .await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get("retry-after").is_some());

        // Blocked even with the right password
        server
            .post("/api/v1/auth/login")
            .json(&json!({ "phoneOrEmail": "mussa@duka.co.tz", "password": STRONG_PASSWORD }))
            .await
            .assert_status(StatusCode::TOO_MANY_REQUESTS);
    }

    #[test_log::test(tokio::test)]
    async fn test_logins_from_two_browsers_keep_separate_sessions() {
        const FIREFOX: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0";
        const CHROME: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";
        let (server, state) = create_test_app();
        signup_user(&state, "zawadi@duka.co.tz", Role::User).await;

        let mut tokens = Vec::new();
        for agent in [FIREFOX, CHROME] {
            let response = server
                .post("/api/v1/auth/login")
                .add_header("user-agent", agent)
                .json(&json!({ "phoneOrEmail": "zawadi@duka.co.tz", "password": STRONG_PASSWORD }))
                .await;
            response.assert_status_ok();
            tokens.push(response.json::<AuthResponse>().token);
        }
        assert_ne!(tokens[0], tokens[1]);

        for (token, agent) in tokens.iter().zip([FIREFOX, CHROME]) {
            server
                .get("/api/v1/profile")
                .authorization_bearer(token)
                .add_header("user-agent", agent)
                .await
                .assert_status_ok();
        }

        server
            .post("/api/v1/auth/logout")
            .authorization_bearer(&tokens[1])
            .add_header("user-agent", CHROME)
            .await
            .assert_status_ok();
        server
            .get("/api/v1/profile")
            .authorization_bearer(&tokens[0])
            .add_header("user-agent", FIREFOX)
            .await
            .assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_user_is_invalid_credentials() {
        let (server, _state) = create_test_app();
        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({ "phoneOrEmail": "ghost@duka.co.tz", "password": STRONG_PASSWORD }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let error: Value = response.json();
        assert_eq!(error["error"], "Invalid credentials");
    }

    #[test_log::test(tokio::test)]
    async fn test_logout_revokes_session() {
        let (server, state) = create_test_app();
        let (_, token) = signup_user(&state, "rehema@duka.co.tz", Role::User).await;

        let response = server.post("/api/v1/auth/logout").authorization_bearer(&token).await;
        response.assert_status_ok();
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
        assert!(cookie.contains("Max-Age=0"));

        server
            .get("/api/v1/profile")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // Logging out without a session still clears the cookie
        server.post("/api/v1/auth/logout").await.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_password_reset_flow() {
        let (server, state) = create_test_app();
        let (user, _) = signup_user(&state, "halima@duka.co.tz", Role::User).await;

        server
            .post("/api/v1/auth/reset-password")
            .json(&json!({ "email": "nobody@duka.co.tz" }))
            .await
            .assert_status_ok();

        PasswordResetTokens::new(&state.store)
            .create(&PasswordResetTokenCreateDBRequest {
                user_id: user.id,
                email: user.email.clone(),
                raw_token: "raw-reset-token".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            })
            .await
            .unwrap();

        let response = server
            .post("/api/v1/auth/verify-reset-token")
            .json(&json!({ "token": "raw-reset-token" }))
            .await;
        response.assert_status_ok();
        let verified: VerifyResetTokenResponse = response.json();
        assert!(verified.valid);
        assert_eq!(verified.email, "halima@duka.co.tz");

        let new_password = "Serengeti!Lions94";
        server
            .post("/api/v1/auth/update-password")
            .json(&json!({ "token": "raw-reset-token", "password": new_password }))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/v1/auth/verify-reset-token")
            .json(&json!({ "token": "raw-reset-token" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: Value = response.json();
        assert_eq!(error["error"], "This reset token has already been used");

        server
            .post("/api/v1/auth/login")
            .json(&json!({ "phoneOrEmail": "halima@duka.co.tz", "password": new_password }))
            .await
            .assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_expired_reset_token_is_deleted() {
        let (server, state) = create_test_app();
        let (user, _) = signup_user(&state, "zawadi@duka.co.tz", Role::User).await;

        PasswordResetTokens::new(&state.store)
            .create(&PasswordResetTokenCreateDBRequest {
                user_id: user.id,
                email: user.email.clone(),
                raw_token: "stale-token".to_string(),
                expires_at: Utc::now() - Duration::minutes(1),
            })
            .await
            .unwrap();

        let response = server
            .post("/api/v1/auth/verify-reset-token")
            .json(&json!({ "token": "stale-token" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: Value = response.json();
        assert_eq!(error["error"], "Reset token has expired");

        let stored = PasswordResetTokens::new(&state.store)
            .get_by_id("stale-token".to_string())
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_password_tools() {
        let (server, _state) = create_test_app();

        let response = server
            .post("/api/v1/auth/password-strength")
            .json(&json!({ "password": "password123", "email": "a@b.com" }))
            .await;
        response.assert_status_ok();
        let result: PasswordStrengthResponse = response.json();
        assert!(!result.is_valid);
        assert!(result.score <= 30);

        let response = server.get("/api/v1/auth/password/generate").add_query_param("length", 4).await;
        response.assert_status_ok();
        let generated: GeneratedPasswordResponse = response.json();
        assert_eq!(generated.password.chars().count(), 12);
    }
}
