//! # copcca: COPCCA CRM backend
//!
//! `copcca` is the server side of a multi-tenant CRM for small businesses. It keeps each user's
//! CRM collections (customers, deals, debts, campaigns and the rest), a per-user activity feed,
//! team tasks, reports with generated insights, third-party integrations, SMS and WhatsApp
//! messaging for debt collection, and team subscriptions with trials and payments.
//!
//! ## Overview
//!
//! Every account belongs to exactly one team. The first user of a team is its admin; later users
//! join through single-use invitation codes. Admins manage the team's users, settings, tasks and
//! messaging configuration, while every user owns their own CRM records. A small set of platform
//! operators, listed in the configuration, manage billing across all teams.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum). State lives in a document store
//! keyed by strings ([`db::KvStore`]): an in-process map for development and tests, or a single
//! PostgreSQL table for deployments. Repositories in [`db::handlers`] hold the rules for each
//! entity and take care of per-key locking for read-modify-write updates.
//!
//! ### Request Flow
//!
//! Requests to `/api/v1/*` carry a session token as a bearer header or cookie. The
//! [`CurrentUser`](api::models::users::CurrentUser) extractor verifies the JWT, checks that the
//! session is still registered for the presenting device, and loads the user's profile, which is
//! authoritative for role and team. Handlers then check permissions, call repositories and
//! return JSON. Security-relevant events go to a per-user audit trail.
//!
//! ### Core Components
//!
//! - [`api`]: handlers and request/response models
//! - [`auth`]: password hashing, session tokens and the current-user extractor
//! - [`security`]: login throttling, password policy, audit trail and session fingerprints
//! - [`db`]: storage backends, key layout, repositories and stored models
//! - `messaging`: Twilio SMS with credits and send logs, WhatsApp relay
//! - `subscriptions`: plan catalogue, trials and feature gating
//! - `reminders`: the debt follow-up checker and its background scanner
//!
//! **Background services** run next to the HTTP server: a sweep of stale rate limiter entries and
//! the debt reminder scanner. Both stop when the shutdown token fires.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use copcca::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = copcca::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     copcca::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
mod currency;
pub mod db;
mod email;
pub mod errors;
mod messaging;
mod openapi;
mod reminders;
pub mod security;
mod subscriptions;
pub mod telemetry;
pub mod types;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    http::{self, HeaderValue},
    routing::{delete, get, patch, post, put},
};
use bon::Builder;
use sqlx::postgres::PgPoolOptions;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;

pub use config::Config;
use config::{CorsOrigin, DatabaseConfig};
use db::{Store, memory::MemoryKv, postgres::PostgresKv};
use errors::Error;
use openapi::ApiDoc;
use security::{audit::AuditLogger, fingerprint::SessionRegistry, rate_limiter::RateLimiter};
pub use types::{TeamId, UserId};

/// Application state shared across all request handlers.
///
/// Everything in here is cheap to clone; the store, limiter and registries share their
/// backing state.
///
/// ```ignore
/// let store = Store::new(Arc::new(MemoryKv::default()));
/// let audit = AuditLogger::new(store.clone());
/// let state = AppState::builder()
///     .rate_limiter(RateLimiter::new(&config.auth.rate_limit))
///     .sessions(SessionRegistry::new(store.clone(), audit.clone()))
///     .audit(audit)
///     .store(store)
///     .http(http_client()?)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub rate_limiter: RateLimiter,
    pub audit: AuditLogger,
    pub sessions: SessionRegistry,
    pub http: reqwest::Client,
}

impl AppState {
    /// Wire up the shared services over an existing store.
    pub fn from_store(config: Config, store: Store) -> Result<Self, Error> {
        let audit = AuditLogger::new(store.clone());
        Ok(Self::builder()
            .rate_limiter(RateLimiter::new(&config.auth.rate_limit))
            .sessions(SessionRegistry::new(store.clone(), audit.clone()))
            .audit(audit)
            .store(store)
            .http(http_client()?)
            .config(config)
            .build())
    }
}

/// Get the copcca database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Outbound HTTP client for Twilio, WhatsApp and Resend calls.
pub fn http_client() -> Result<reqwest::Client, Error> {
    // Installing twice is harmless; the first provider wins.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::Internal {
            operation: format!("build HTTP client: {e}"),
        })
}

/// Open the configured storage backend, migrating PostgreSQL first.
async fn setup_store(config: &Config) -> anyhow::Result<Store> {
    match &config.database {
        DatabaseConfig::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            Ok(Store::new(Arc::new(MemoryKv::default())))
        }
        DatabaseConfig::Postgres { url, pool } => {
            let pg = PgPoolOptions::new()
                .max_connections(pool.max_connections)
                .min_connections(pool.min_connections)
                .acquire_timeout(Duration::from_secs(pool.acquire_timeout_secs))
                .connect(url)
                .await?;
            migrator().run(&pg).await?;
            info!("Connected to PostgreSQL storage");
            Ok(Store::new(Arc::new(PostgresKv::new(pg))))
        }
    }
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allowed = &config.auth.security.cors.allowed_origins;
    let allow_origin = if allowed.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in allowed {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers([http::header::LOCATION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build the router: `/health`, `/api/openapi.json` and every `/api/v1` route, with CORS and
/// request tracing.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{
        ai_reports, auth, company, currencies, integrations, profile, records, reports, sms, subscriptions, tasks, users,
        whatsapp,
    };

    let api_routes = Router::new()
        // Authentication
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/reset-password", post(auth::request_password_reset))
        .route("/auth/verify-reset-token", post(auth::verify_reset_token))
        .route("/auth/update-password", post(auth::update_password))
        .route("/auth/password-strength", post(auth::password_strength))
        .route("/auth/password/generate", get(auth::generate_password))
        // Profile and security
        .route("/profile", get(profile::get_profile).put(profile::update_profile))
        .route("/sessions", get(profile::list_sessions).delete(profile::revoke_other_sessions))
        .route("/sessions/{id}", delete(profile::revoke_session))
        .route("/security/audit", get(profile::list_audit_entries))
        // Users and team
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/team/members", get(users::list_team_members))
        // CRM collections
        .route("/records/{collection}", get(records::list_records).post(records::create_record))
        .route(
            "/records/{collection}/{id}",
            put(records::update_record).delete(records::delete_record),
        )
        .route("/activities", get(records::list_activities))
        .route("/debt/reminders", get(records::debt_reminders))
        // Tasks
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/tasks/stats", get(tasks::task_stats))
        .route("/tasks/user/{user_id}", get(tasks::list_user_tasks))
        .route("/tasks/{id}", put(tasks::update_task).delete(tasks::delete_task))
        .route("/tasks/{id}/status", patch(tasks::update_task_status))
        // Integrations
        .route(
            "/integrations",
            get(integrations::list_integrations).post(integrations::create_integration),
        )
        .route(
            "/integrations/{id}",
            put(integrations::update_integration).delete(integrations::delete_integration),
        )
        .route("/integrations/{id}/sync", post(integrations::sync_integration))
        // Reports
        .route("/reports", get(reports::list_reports).post(reports::create_report))
        .route(
            "/reports/{id}",
            get(reports::get_report).put(reports::update_report).delete(reports::delete_report),
        )
        .route(
            "/ai-reports",
            get(ai_reports::list_ai_reports).post(ai_reports::save_ai_report),
        )
        .route("/ai-reports/{date}/{period}", delete(ai_reports::delete_ai_report))
        // Company and invitations
        .route(
            "/company/settings",
            get(company::get_company_settings).put(company::update_company_settings),
        )
        .route("/invitations/generate", post(company::generate_invitation))
        .route("/invitations/email", post(company::email_invitation))
        .route("/invitations/verify/{code}", get(company::verify_invitation))
        // SMS
        .route("/sms/settings", get(sms::get_sms_settings).put(sms::update_sms_settings))
        .route("/sms/credits", get(sms::get_sms_credits))
        .route("/sms/send", post(sms::send_sms))
        .route("/sms/send-bulk", post(sms::send_bulk_sms))
        .route("/sms/debt-reminder", post(sms::send_debt_reminder))
        .route("/sms/payment-confirmation", post(sms::send_payment_confirmation))
        .route("/sms/stats", get(sms::sms_stats))
        // WhatsApp
        .route("/whatsapp/send", post(whatsapp::send_whatsapp))
        .route("/whatsapp/send-bulk", post(whatsapp::send_whatsapp_bulk))
        .route("/whatsapp/validate", post(whatsapp::validate_whatsapp_number))
        .route("/whatsapp/send-template", post(whatsapp::send_whatsapp_template))
        // Subscriptions
        .route("/subscription/plans", get(subscriptions::list_plans))
        .route("/subscription/initialize", post(subscriptions::initialize_subscription))
        .route("/subscription/status", get(subscriptions::subscription_status))
        .route("/subscription/payment", post(subscriptions::create_payment))
        .route("/subscription/payments", get(subscriptions::list_payments))
        .route("/subscription/access", get(subscriptions::module_access))
        // Currencies
        .route("/currencies", get(currencies::list_currencies))
        .route("/currencies/convert", post(currencies::convert))
        // Platform operators
        .route("/admin/subscriptions", get(subscriptions::list_all_subscriptions))
        .route("/admin/subscription/status", put(subscriptions::set_subscription_status))
        .route("/admin/payment/status", put(subscriptions::set_payment_status))
        .route("/admin/sms/credits", post(sms::top_up_sms_credits));

    let cors = create_cors_layer(&state.config)?;
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Background tasks running next to the HTTP server.
///
/// Dropping the struct cancels the shutdown token through `drop_guard`.
pub struct BackgroundServices {
    background_tasks: Vec<JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    fn start(state: &AppState, shutdown_token: CancellationToken) -> Self {
        let drop_guard = shutdown_token.clone().drop_guard();
        let mut background_tasks = vec![
            state
                .rate_limiter
                .spawn_cleanup(state.config.auth.rate_limit.cleanup_interval, shutdown_token.clone()),
        ];

        if state.config.reminders.enabled {
            background_tasks.push(reminders::spawn_reminder_scanner(
                state.store.clone(),
                state.config.reminders.clone(),
                shutdown_token.clone(),
            ));
        } else {
            info!("Debt reminder scanner disabled");
        }

        Self {
            background_tasks,
            shutdown_token,
            drop_guard: Some(drop_guard),
        }
    }

    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Top-level container owning the router, shared state and background services.
///
/// 1. [`Application::new`] opens storage (running migrations), builds the state and router
///    and starts background services
/// 2. [`Application::serve`] binds the port and serves until the shutdown future resolves,
///    then stops background work and flushes telemetry
pub struct Application {
    router: Router,
    config: Config,
    bg_services: BackgroundServices,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(bind = %config.bind_address(), otel = config.enable_otel_export, "Starting copcca");

        let store = setup_store(&config).await?;
        let state = AppState::from_store(config.clone(), store)?;
        let bg_services = BackgroundServices::start(&state, CancellationToken::new());
        let router = build_router(state)?;

        Ok(Self {
            router,
            config,
            bg_services,
        })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "copcca listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_app, create_test_config, create_test_state};
    use axum::http::StatusCode;

    #[test_log::test(tokio::test)]
    async fn test_health_and_openapi() {
        let (server, _) = create_test_app();

        let response = server.get("/health").await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!({ "status": "ok" }));

        let response = server.get("/api/openapi.json").await;
        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert_eq!(doc["info"]["title"], "COPCCA CRM API");
    }

    #[test_log::test(tokio::test)]
    async fn test_protected_routes_need_a_session() {
        let (server, _) = create_test_app();
        server.get("/api/v1/profile").await.assert_status(StatusCode::UNAUTHORIZED);
        server.get("/api/v1/subscription/plans").await.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_background_services_stop_on_shutdown() {
        let mut config = create_test_config();
        config.reminders.enabled = true;
        let state = AppState { config, ..create_test_state() };

        let services = BackgroundServices::start(&state, CancellationToken::new());
        assert_eq!(services.background_tasks.len(), 2);
        tokio::time::timeout(Duration::from_secs(5), services.shutdown())
            .await
            .unwrap();
    }

    #[test]
    fn test_cors_layer_from_configured_origins() {
        let mut config = create_test_config();
        config.auth.security.cors.allowed_origins =
            vec![CorsOrigin::Url(url::Url::parse("https://app.copcca.com/").unwrap())];
        assert!(create_cors_layer(&config).is_ok());

        config.auth.security.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        config.auth.security.cors.allow_credentials = false;
        assert!(create_cors_layer(&config).is_ok());
    }
}
