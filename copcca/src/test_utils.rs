//! Test utilities for integration testing (available with `test-utils` feature).

use std::{sync::Arc, time::Duration};

use axum::http::HeaderMap;
use axum_test::TestServer;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::{password::hash_password, session::create_session_token},
    config::{Config, EmailTransportConfig, PasswordConfig},
    db::{
        Store,
        handlers::{Repository, Teams, Users},
        memory::MemoryKv,
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
    security::fingerprint::DeviceFingerprint,
    subscriptions::SubscriptionService,
    types::{Role, abbrev_uuid},
};

/// Passes the default password policy.
pub const STRONG_PASSWORD: &str = "Kilimanjaro#2025x";

/// Listed in `subscriptions.platform_admins` of [`create_test_config`].
pub const PLATFORM_ADMIN_EMAIL: &str = "ops@copcca.co.tz";

pub fn create_test_config() -> Config {
    let mut config = Config {
        secret_key: Some("test-secret-key-for-copcca-sessions".to_string()),
        ..Default::default()
    };
    config.email.transport = EmailTransportConfig::Disabled;
    // Cheap hashing keeps the suite fast
    config.auth.password = PasswordConfig {
        argon2_memory_kib: 8,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..Default::default()
    };
    config.sms.bulk_delay = Duration::from_millis(1);
    config.whatsapp.bulk_delay = Duration::from_millis(1);
    config.reminders.enabled = false;
    config.subscriptions.platform_admins = vec![PLATFORM_ADMIN_EMAIL.to_string()];
    config
}

/// State over a fresh in-memory store.
pub fn create_test_state_with_config(config: Config) -> AppState {
    let store = Store::new(Arc::new(MemoryKv::default()));
    AppState::from_store(config, store).expect("Failed to build test state")
}

pub fn create_test_state() -> AppState {
    create_test_state_with_config(create_test_config())
}

pub fn create_test_app() -> (TestServer, AppState) {
    create_test_app_with_config(create_test_config())
}

pub fn create_test_app_with_config(config: Config) -> (TestServer, AppState) {
    let state = create_test_state_with_config(config);
    let router = crate::build_router(state.clone()).expect("Failed to build router");
    let server = TestServer::new(router.into_make_service()).expect("Failed to create test server");
    (server, state)
}

async fn insert_user(state: &AppState, email: &str, role: Role, team_id: Option<String>) -> UserDBResponse {
    let id = Uuid::new_v4();
    let password_hash = hash_password(STRONG_PASSWORD, &state.config.auth.password).expect("Failed to hash password");
    let name = email.split('@').next().unwrap_or(email).to_string();
    Users::new(&state.store)
        .create(&UserCreateDBRequest {
            id,
            name,
            email: email.to_string(),
            phone: None,
            company: Some("Duka La Mama".to_string()),
            role,
            team_id: team_id.unwrap_or_else(|| format!("team-{}", abbrev_uuid(&id))),
            password_hash,
        })
        .await
        .expect("Failed to create test user")
}

/// Register a session for `user` as seen from a client that sends no identifying headers.
pub async fn open_test_session(state: &AppState, user: &UserDBResponse) -> String {
    let (token, claims) = create_session_token(&CurrentUser::from(user), &state.config).expect("Failed to sign session");
    state
        .sessions
        .register(
            user.id,
            &token,
            DeviceFingerprint::from_headers(&HeaderMap::new()),
            claims.expires_at(),
        )
        .await
        .expect("Failed to register session");
    token
}

/// Create a user owning a new team on a trial subscription, plus a session token.
pub async fn signup_user(state: &AppState, email: &str, role: Role) -> (UserDBResponse, String) {
    let user = insert_user(state, email, role, None).await;
    Teams::new(&state.store)
        .create(&user.team_id, &format!("{}'s Team", user.name), user.id)
        .await
        .expect("Failed to create team");
    SubscriptionService::new(&state.store, &state.config.subscriptions)
        .start_trial(&user.team_id, Utc::now())
        .await
        .expect("Failed to start trial");
    let token = open_test_session(state, &user).await;
    (user, token)
}

/// Add a user to `admin`'s team directly, skipping invitations and plan limits.
pub async fn add_team_member(state: &AppState, admin: &UserDBResponse, email: &str, role: Role) -> (UserDBResponse, String) {
    let user = insert_user(state, email, role, Some(admin.team_id.clone())).await;
    Teams::new(&state.store)
        .add_member(&admin.team_id, user.id)
        .await
        .expect("Failed to join team");
    let token = open_test_session(state, &user).await;
    (user, token)
}
