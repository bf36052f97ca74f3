//! Plans, team subscriptions and payment bookkeeping.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use crate::{
    AppState,
    api::models::{
        subscriptions::{
            AccessQuery, AccessResponse, InitializeSubscriptionRequest, PaymentListResponse, PaymentRequest, PaymentResponse,
            PaymentStatusUpdate, PlanListResponse, SubscriptionListResponse, SubscriptionResponse, SubscriptionStatusUpdate,
        },
        users::CurrentUser,
    },
    auth::current_user::{require_admin, require_platform_admin},
    db::{
        errors::DbError,
        handlers::{Payments, Repository, Subscriptions},
        models::subscriptions::{PaymentCreateDBRequest, PaymentFilter, PaymentStatus},
    },
    errors::{Error, Result},
    subscriptions::{SubscriptionService, SubscriptionSummary, has_module_access, module_feature, plans},
};

fn service(state: &AppState) -> SubscriptionService<'_> {
    SubscriptionService::new(&state.store, &state.config.subscriptions)
}

#[utoipa::path(
    get,
    path = "/subscription/plans",
    tag = "subscriptions",
    responses((status = 200, description = "Available plans", body = PlanListResponse))
)]
#[tracing::instrument(skip_all)]
pub async fn list_plans() -> Json<PlanListResponse> {
    Json(PlanListResponse { plans: plans() })
}

/// Choose a plan for the caller's team
///
/// A running trial keeps its end date.
#[utoipa::path(
    post,
    path = "/subscription/initialize",
    tag = "subscriptions",
    request_body = InitializeSubscriptionRequest,
    responses(
        (status = 200, description = "Updated subscription", body = SubscriptionResponse),
        (status = 403, description = "Admin access required"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn initialize_subscription(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<InitializeSubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>> {
    require_admin(&current_user)?;
    let subscription = service(&state)
        .change_plan(&current_user.team_id, request.plan, Utc::now())
        .await?;
    info!(team_id = %current_user.team_id, plan = %request.plan, "Subscription plan selected");
    Ok(Json(SubscriptionResponse {
        success: true,
        subscription,
    }))
}

#[utoipa::path(
    get,
    path = "/subscription/status",
    tag = "subscriptions",
    responses((status = 200, description = "Subscription summary", body = SubscriptionSummary)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn subscription_status(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<SubscriptionSummary>> {
    let now = Utc::now();
    let subscription = service(&state).current(&current_user.team_id, now).await?;
    Ok(Json(SubscriptionSummary::new(subscription, now)))
}

/// Record a payment awaiting confirmation
#[utoipa::path(
    post,
    path = "/subscription/payment",
    tag = "subscriptions",
    request_body = PaymentRequest,
    responses(
        (status = 201, description = "Pending payment", body = PaymentResponse),
        (status = 400, description = "Invalid amount or method"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>)> {
    if request.amount <= Decimal::ZERO {
        return Err(Error::bad_request("Amount must be positive"));
    }
    if request.method.trim().is_empty() {
        return Err(Error::bad_request("Payment method is required"));
    }

    let payment = Payments::new(&state.store)
        .create(&PaymentCreateDBRequest {
            team_id: current_user.team_id.clone(),
            plan: request.plan,
            amount: request.amount,
            method: request.method.trim().to_string(),
            reference: request.reference.filter(|r| !r.trim().is_empty()),
            created_by: current_user.id,
        })
        .await?;
    info!(payment_id = %payment.id, team_id = %payment.team_id, "Payment recorded");
    Ok((StatusCode::CREATED, Json(PaymentResponse { success: true, payment })))
}

#[utoipa::path(
    get,
    path = "/subscription/payments",
    tag = "subscriptions",
    responses((status = 200, description = "The team's payments, newest first", body = PaymentListResponse)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_payments(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<PaymentListResponse>> {
    let payments = Payments::new(&state.store)
        .list(&PaymentFilter {
            team_id: Some(current_user.team_id.clone()),
            ..Default::default()
        })
        .await?;
    Ok(Json(PaymentListResponse { payments }))
}

/// Whether the team's subscription opens a page module
#[utoipa::path(
    get,
    path = "/subscription/access",
    tag = "subscriptions",
    params(AccessQuery),
    responses((status = 200, description = "Access decision", body = AccessResponse)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn module_access(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<AccessQuery>,
) -> Result<Json<AccessResponse>> {
    let now = Utc::now();
    let subscription = service(&state).current(&current_user.team_id, now).await?;
    Ok(Json(AccessResponse {
        allowed: has_module_access(subscription.as_ref(), &query.module, now),
        feature: module_feature(&query.module).map(str::to_string),
        module: query.module,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/subscriptions",
    tag = "admin",
    responses(
        (status = 200, description = "Every team's subscription", body = SubscriptionListResponse),
        (status = 403, description = "Platform admin access required"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_all_subscriptions(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<SubscriptionListResponse>> {
    require_platform_admin(&current_user, &state.config)?;
    let subscriptions = Subscriptions::new(&state.store).list_all().await?;
    Ok(Json(SubscriptionListResponse { subscriptions }))
}

#[utoipa::path(
    put,
    path = "/admin/subscription/status",
    tag = "admin",
    request_body = SubscriptionStatusUpdate,
    responses(
        (status = 200, description = "Updated subscription", body = SubscriptionResponse),
        (status = 403, description = "Platform admin access required"),
        (status = 404, description = "Team has no subscription"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn set_subscription_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(update): Json<SubscriptionStatusUpdate>,
) -> Result<Json<SubscriptionResponse>> {
    require_platform_admin(&current_user, &state.config)?;
    let subscription = service(&state)
        .set_status(&update.team_id, update.status, Utc::now())
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Subscription".to_string(),
            id: update.team_id.clone(),
        })?;
    info!(team_id = %update.team_id, status = ?update.status, by = %current_user.email, "Subscription status set");
    Ok(Json(SubscriptionResponse {
        success: true,
        subscription,
    }))
}

/// Settle a payment
///
/// Marking a payment `completed` activates its plan for the team.
#[utoipa::path(
    put,
    path = "/admin/payment/status",
    tag = "admin",
    request_body = PaymentStatusUpdate,
    responses(
        (status = 200, description = "Updated payment", body = PaymentResponse),
        (status = 403, description = "Platform admin access required"),
        (status = 404, description = "Payment not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn set_payment_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(update): Json<PaymentStatusUpdate>,
) -> Result<Json<PaymentResponse>> {
    require_platform_admin(&current_user, &state.config)?;
    let payment = Payments::new(&state.store)
        .update(update.payment_id.clone(), &update.status)
        .await
        .map_err(|e| match e {
            DbError::NotFound => Error::NotFound {
                resource: "Payment".to_string(),
                id: update.payment_id.clone(),
            },
            other => other.into(),
        })?;

    if payment.status == PaymentStatus::Completed {
        service(&state).activate(&payment.team_id, payment.plan, Utc::now()).await?;
    }
    info!(payment_id = %payment.id, status = ?payment.status, by = %current_user.email, "Payment status set");
    Ok(Json(PaymentResponse { success: true, payment }))
}
