//! Saved AI analysis snapshots, kept as one list per user.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::{
        handlers::users::require_teammate,
        models::{
            reports::{AiReportSave, AiReportSavedResponse, AiReportsQuery},
            users::{CurrentUser, SuccessResponse},
        },
    },
    db::{
        handlers::AiReports,
        models::ai_reports::{AiReport, AiReportSaveDBRequest},
    },
    errors::{Error, Result},
    types::UserId,
};

async fn target_owner(state: &AppState, current_user: &CurrentUser, query: &AiReportsQuery) -> Result<UserId> {
    match query.user_id {
        Some(user_id) if user_id != current_user.id => Ok(require_teammate(state, current_user, user_id).await?.id),
        _ => Ok(current_user.id),
    }
}

#[utoipa::path(
    get,
    path = "/ai-reports",
    tag = "reports",
    params(AiReportsQuery),
    responses((status = 200, description = "Saved AI reports", body = Vec<AiReport>)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_ai_reports(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<AiReportsQuery>,
) -> Result<Json<Vec<AiReport>>> {
    let owner = target_owner(&state, &current_user, &query).await?;
    Ok(Json(AiReports::new(&state.store).list(&owner).await?))
}

/// Save an AI report
///
/// Replaces an earlier report for the same `date` and `period`, keeping its `createdAt`.
#[utoipa::path(
    post,
    path = "/ai-reports",
    tag = "reports",
    params(AiReportsQuery),
    request_body = AiReportSave,
    responses(
        (status = 200, description = "Saved report", body = AiReportSavedResponse),
        (status = 400, description = "Date and period are required"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn save_ai_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<AiReportsQuery>,
    Json(request): Json<AiReportSave>,
) -> Result<Json<AiReportSavedResponse>> {
    let date = request.date.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let period = request.period.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let (Some(date), Some(period)) = (date, period) else {
        return Err(Error::bad_request("Date and period are required"));
    };

    let owner = target_owner(&state, &current_user, &query).await?;
    let report = AiReports::new(&state.store)
        .save(
            &owner,
            AiReportSaveDBRequest {
                date: date.to_string(),
                period: period.to_string(),
                insights: request.insights,
                metrics: request.metrics,
            },
        )
        .await?;
    Ok(Json(AiReportSavedResponse { success: true, report }))
}

/// Delete the AI report for a date and period. Succeeds when there was none.
#[utoipa::path(
    delete,
    path = "/ai-reports/{date}/{period}",
    tag = "reports",
    params(
        ("date" = String, Path, description = "Report date as saved"),
        ("period" = String, Path, description = "Report period as saved"),
        AiReportsQuery,
    ),
    responses((status = 200, description = "Report removed", body = SuccessResponse)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_ai_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((date, period)): Path<(String, String)>,
    Query(query): Query<AiReportsQuery>,
) -> Result<Json<SuccessResponse>> {
    let owner = target_owner(&state, &current_user, &query).await?;
    AiReports::new(&state.store).delete(&owner, &date, &period).await?;
    Ok(Json(SuccessResponse::ok()))
}
