//! Team reports with keyword-driven insights.
//!
//! Creating a report (or changing its content) scans the text for module keywords. Every
//! module with findings gets an entry in the author's activity feed, so the insight shows up
//! next to the module's own activity.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    AppState,
    api::models::{
        reports::{ReportCreate, ReportListResponse, ReportRecordResponse, ReportResponse, ReportUpdate},
        users::{CurrentUser, SuccessResponse},
    },
    db::{
        handlers::{Activities, Reports, Repository, Users},
        models::{
            activities::{ActivityCreateDBRequest, Priority},
            reports::{ReportCreateDBRequest, ReportDBResponse, ReportFilter},
        },
    },
    errors::{Error, Result},
    types::UserId,
};

fn report_not_found(id: &str) -> Error {
    Error::NotFound {
        resource: "Report".to_string(),
        id: id.to_string(),
    }
}

async fn team_report(state: &AppState, current_user: &CurrentUser, id: &str) -> Result<ReportDBResponse> {
    Reports::new(&state.store)
        .get_by_id(id.to_string())
        .await?
        .filter(|r| r.team_id == current_user.team_id)
        .ok_or_else(|| report_not_found(id))
}

fn require_author_or_admin(current_user: &CurrentUser, report: &ReportDBResponse) -> Result<()> {
    if current_user.is_admin() || report.created_by == current_user.id {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            reason: "Only the author or an admin can change this report".to_string(),
        })
    }
}

async fn log_insights(state: &AppState, user_id: &UserId, report: &ReportDBResponse) {
    let mut activities = Activities::new(&state.store);
    for insight in &report.insights {
        let details = insight
            .insights
            .first()
            .cloned()
            .unwrap_or_else(|| "New insights from report".to_string());
        activities
            .log(
                user_id,
                ActivityCreateDBRequest::new(
                    insight.module.display_name(),
                    format!("Report insights: {}", report.title),
                    details,
                    Priority::Medium,
                ),
            )
            .await;
    }
}

/// Attach each author's display name.
async fn with_author_names(state: &AppState, reports: Vec<ReportDBResponse>) -> Result<Vec<ReportResponse>> {
    let mut author_ids: Vec<UserId> = reports.iter().map(|r| r.created_by).collect();
    author_ids.sort();
    author_ids.dedup();
    let authors = Users::new(&state.store).get_bulk(author_ids).await?;

    Ok(reports
        .into_iter()
        .map(|report| {
            let name = authors.get(&report.created_by).map(|u| u.name.clone());
            ReportResponse {
                created_by_name: name,
                ..ReportResponse::from(report)
            }
        })
        .collect())
}

async fn single_response(state: &AppState, report: ReportDBResponse) -> Result<Json<ReportRecordResponse>> {
    let report = with_author_names(state, vec![report])
        .await?
        .pop()
        .ok_or_else(|| Error::Internal {
            operation: "enrich report".to_string(),
        })?;
    Ok(Json(ReportRecordResponse { success: true, report }))
}

/// Reports of the caller's team, newest first
#[utoipa::path(
    get,
    path = "/reports",
    tag = "reports",
    responses((status = 200, description = "Reports", body = ReportListResponse)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_reports(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ReportListResponse>> {
    let reports = Reports::new(&state.store)
        .list(&ReportFilter {
            team_id: Some(current_user.team_id.clone()),
            ..Default::default()
        })
        .await?;
    Ok(Json(ReportListResponse {
        success: true,
        reports: with_author_names(&state, reports).await?,
    }))
}

#[utoipa::path(
    get,
    path = "/reports/{id}",
    tag = "reports",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report", body = ReportRecordResponse),
        (status = 404, description = "Report not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ReportRecordResponse>> {
    let report = team_report(&state, &current_user, &id).await?;
    single_response(&state, report).await
}

/// Submit a report
#[utoipa::path(
    post,
    path = "/reports",
    request_body = ReportCreate,
    tag = "reports",
    responses(
        (status = 201, description = "Report stored with its insights", body = ReportRecordResponse),
        (status = 400, description = "Title and content are required"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ReportCreate>,
) -> Result<(StatusCode, Json<ReportRecordResponse>)> {
    let title = request.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let content = request.content.as_deref().filter(|c| !c.trim().is_empty());
    let (Some(title), Some(content)) = (title, content) else {
        return Err(Error::bad_request("Title and content are required"));
    };

    let report = Reports::new(&state.store)
        .create(&ReportCreateDBRequest {
            report_type: request.report_type.clone(),
            title: title.to_string(),
            content: content.to_string(),
            file_name: request.file_name,
            file_size: request.file_size,
            created_by: current_user.id,
            team_id: current_user.team_id.clone(),
        })
        .await?;

    log_insights(&state, &current_user.id, &report).await;
    Activities::new(&state.store)
        .log(
            &current_user.id,
            ActivityCreateDBRequest::new(
                "Report",
                format!("Created {} report", report.report_type),
                report.title.clone(),
                Priority::Low,
            ),
        )
        .await;
    info!(report_id = %report.id, modules = report.insights.len(), "Report analyzed");

    Ok((StatusCode::CREATED, single_response(&state, report).await?))
}

/// Edit a report
///
/// Fields beyond `title`, `content` and `type` are stored as sent and returned under `extra`.
#[utoipa::path(
    put,
    path = "/reports/{id}",
    request_body = ReportUpdate,
    tag = "reports",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "Updated report", body = ReportRecordResponse),
        (status = 403, description = "Not the author or an admin"),
        (status = 404, description = "Report not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<ReportRecordResponse>> {
    let existing = team_report(&state, &current_user, &id).await?;
    require_author_or_admin(&current_user, &existing)?;

    let request = ReportUpdate::from_body(body).map_err(|e| Error::bad_request(format!("Invalid report update: {e}")))?;
    let report = Reports::new(&state.store).update(id, &request).await?;

    if report.content != existing.content {
        log_insights(&state, &current_user.id, &report).await;
    }
    Activities::new(&state.store)
        .log(
            &current_user.id,
            ActivityCreateDBRequest::new("Report", "Updated report", report.title.clone(), Priority::Low),
        )
        .await;
    single_response(&state, report).await
}

#[utoipa::path(
    delete,
    path = "/reports/{id}",
    tag = "reports",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report deleted", body = SuccessResponse),
        (status = 403, description = "Not the author or an admin"),
        (status = 404, description = "Report not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    let report = team_report(&state, &current_user, &id).await?;
    require_author_or_admin(&current_user, &report)?;

    Reports::new(&state.store).delete(report.id.clone()).await?;
    Activities::new(&state.store)
        .log(
            &current_user.id,
            ActivityCreateDBRequest::new("Report", "Deleted report", report.title, Priority::Low),
        )
        .await;
    Ok(Json(SuccessResponse::ok()))
}
