use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use moka::future::Cache;
use once_cell::sync::Lazy;
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    config::Config,
    db::{
        handlers::{Repository, Users},
        models::users::UserDBResponse,
    },
    errors::{Error, Result},
    security::fingerprint::{DeviceFingerprint, SessionCheck},
    types::UserId,
};

/// Recently loaded profiles, so authenticated requests skip a storage round trip
static PROFILE_CACHE: Lazy<Cache<UserId, UserDBResponse>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(30))
        .build()
});

/// Drop a cached profile after it changed or was deleted.
pub async fn invalidate_profile(user_id: &UserId) {
    PROFILE_CACHE.invalidate(user_id).await;
}

/// Session token from `Authorization: Bearer` or, failing that, the session cookie.
fn extract_token(parts: &Parts, config: &Config) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    let cookie_name = &config.auth.session.cookie_name;
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|c| c.trim().split_once('='))
        .find(|(name, value)| name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

async fn load_profile(state: &AppState, user_id: UserId) -> Result<Option<UserDBResponse>> {
    if let Some(profile) = PROFILE_CACHE.get(&user_id).await {
        return Ok(Some(profile));
    }
    let profile = Users::new(&state.store).get_by_id(user_id).await?;
    if let Some(profile) = &profile {
        PROFILE_CACHE.insert(user_id, profile.clone()).await;
    }
    Ok(profile)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let Some(token) = extract_token(parts, &state.config) else {
            trace!("No session token in request");
            return Err(Error::Unauthenticated { message: None });
        };

        let claims = session::verify_session_token(&token, &state.config)?;

        let fingerprint = DeviceFingerprint::from_headers(&parts.headers);
        if let SessionCheck::Invalid(reason) = state.sessions.verify(claims.sub, &token, &fingerprint).await? {
            debug!(user_id = %claims.sub, %reason, "Session rejected");
            return Err(Error::Unauthenticated { message: Some(reason) });
        }

        // Role and team come from the stored profile so demotions apply immediately
        let profile = load_profile(state, claims.sub).await?.ok_or_else(|| Error::Unauthenticated {
            message: Some("User not found".to_string()),
        })?;

        Ok(CurrentUser {
            id: profile.id,
            email: profile.email,
            name: profile.name,
            role: profile.role,
            team_id: profile.team_id,
            token,
        })
    }
}

/// Any failure reads as "no user", for endpoints that also serve anonymous callers.
impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Option<Self>, Infallible> {
        Ok(<CurrentUser as FromRequestParts<AppState>>::from_request_parts(parts, state)
            .await
            .ok())
    }
}

/// Caller must be a team admin.
pub fn require_admin(user: &CurrentUser) -> Result<()> {
    if user.is_admin() { Ok(()) } else { Err(Error::admin_required()) }
}

/// Caller must be listed as a platform operator in `subscriptions.platform_admins`.
pub fn require_platform_admin(user: &CurrentUser, config: &Config) -> Result<()> {
    if config.is_platform_admin(&user.email) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            reason: "Platform admin access required".to_string(),
        })
    }
}
