use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};
use tracing::info;

use crate::{
    AppState,
    api::{
        handlers::users::require_teammate,
        models::{
            tasks::{
                ListTasksQuery, TaskCreate, TaskListResponse, TaskRecordResponse, TaskResponse, TaskStatsQuery,
                TaskStatsResponse, TaskStatusUpdate, TaskUpdate,
            },
            users::{CurrentUser, SuccessResponse},
        },
    },
    auth::current_user::require_admin,
    db::{
        handlers::{Repository, Tasks},
        models::tasks::{TaskCreateDBRequest, TaskDBResponse, TaskFilter, TaskStats, TaskUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{UserId, abbrev_uuid},
};

const DEFAULT_DUE_DAYS: i64 = 7;

fn task_not_found(id: i64) -> Error {
    Error::NotFound {
        resource: "Task".to_string(),
        id: id.to_string(),
    }
}

/// Load a task of the caller's team. Other teams' tasks read as missing.
async fn team_task(state: &AppState, current_user: &CurrentUser, id: i64) -> Result<TaskDBResponse> {
    Tasks::new(&state.store)
        .get_by_id(id)
        .await?
        .filter(|t| t.team_id == current_user.team_id)
        .ok_or_else(|| task_not_found(id))
}

fn require_admin_or_assignee(current_user: &CurrentUser, task: &TaskDBResponse) -> Result<()> {
    if current_user.is_admin() || task.assigned_to == current_user.id {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            reason: "Only admins or the assignee can update this task".to_string(),
        })
    }
}

async fn tasks_involving(state: &AppState, current_user: &CurrentUser, user_id: UserId) -> Result<Vec<TaskDBResponse>> {
    let filter = TaskFilter {
        team_id: Some(current_user.team_id.clone()),
        involving: Some(user_id),
        ..Default::default()
    };
    Ok(Tasks::new(&state.store).list(&filter).await?)
}

fn list_response(tasks: Vec<TaskDBResponse>) -> Json<TaskListResponse> {
    Json(TaskListResponse {
        success: true,
        records: tasks.into_iter().map(TaskResponse::from).collect(),
    })
}

/// List tasks
///
/// Admins may pass `all=true` for the whole team or `userId` for one member. Everyone else
/// sees the tasks assigned to or by them.
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "tasks",
    params(ListTasksQuery),
    responses(
        (status = 200, description = "Tasks, newest first", body = TaskListResponse),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_tasks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<TaskListResponse>> {
    if current_user.is_admin() && query.all {
        let tasks = Tasks::new(&state.store)
            .list(&TaskFilter {
                team_id: Some(current_user.team_id.clone()),
                ..Default::default()
            })
            .await?;
        return Ok(list_response(tasks));
    }

    let user_id = match query.user_id {
        Some(user_id) if current_user.is_admin() => user_id,
        _ => current_user.id,
    };
    Ok(list_response(tasks_involving(&state, &current_user, user_id).await?))
}

/// Tasks assigned to or by one user
#[utoipa::path(
    get,
    path = "/tasks/user/{user_id}",
    tag = "tasks",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Tasks, newest first", body = TaskListResponse),
        (status = 403, description = "Not allowed to read that user's tasks"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_user_tasks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<TaskListResponse>> {
    let user = require_teammate(&state, &current_user, user_id).await?;
    Ok(list_response(tasks_involving(&state, &current_user, user.id).await?))
}

/// Task counters
///
/// Without `userId` admins get team-wide numbers and everyone else their own.
#[utoipa::path(
    get,
    path = "/tasks/stats",
    tag = "tasks",
    params(TaskStatsQuery),
    responses(
        (status = 200, description = "Counters", body = TaskStatsResponse),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn task_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<TaskStatsQuery>,
) -> Result<Json<TaskStatsResponse>> {
    let tasks = match query.user_id {
        Some(user_id) => {
            let user = require_teammate(&state, &current_user, user_id).await?;
            tasks_involving(&state, &current_user, user.id).await?
        }
        None if current_user.is_admin() => {
            Tasks::new(&state.store)
                .list(&TaskFilter {
                    team_id: Some(current_user.team_id.clone()),
                    ..Default::default()
                })
                .await?
        }
        None => tasks_involving(&state, &current_user, current_user.id).await?,
    };
    Ok(Json(TaskStatsResponse {
        success: true,
        stats: TaskStats::compute(&tasks, Utc::now()),
    }))
}

/// Assign a task
#[utoipa::path(
    post,
    path = "/tasks",
    request_body = TaskCreate,
    tag = "tasks",
    responses(
        (status = 201, description = "Task created", body = TaskRecordResponse),
        (status = 400, description = "Missing fields"),
        (status = 403, description = "Admin access required"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_task(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<TaskCreate>,
) -> Result<(StatusCode, Json<TaskRecordResponse>)> {
    require_admin(&current_user)?;

    let title = request.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let (Some(title), Some(assigned_to), Some(assigned_by)) = (title, request.assigned_to, request.assigned_by) else {
        return Err(Error::bad_request("Title, assignedTo, and assignedBy are required"));
    };
    require_teammate(&state, &current_user, assigned_to).await?;

    let task = Tasks::new(&state.store)
        .create(&TaskCreateDBRequest {
            title: title.to_string(),
            description: request.description,
            assigned_to,
            assigned_by,
            assigned_by_name: request.assigned_by_name.unwrap_or_else(|| "Admin".to_string()),
            assigned_to_name: request.assigned_to_name.unwrap_or_else(|| "User".to_string()),
            assigned_to_phone: request.assigned_to_phone.unwrap_or_default(),
            priority: request.priority,
            due_date: request
                .due_date
                .unwrap_or_else(|| Utc::now() + Duration::days(DEFAULT_DUE_DAYS)),
            team_id: current_user.team_id.clone(),
        })
        .await?;

    info!(task_id = task.id, assigned_to = %abbrev_uuid(&assigned_to), "Task assigned");
    Ok((
        StatusCode::CREATED,
        Json(TaskRecordResponse {
            success: true,
            record: task.into(),
        }),
    ))
}

/// Update a task
#[utoipa::path(
    put,
    path = "/tasks/{id}",
    request_body = TaskUpdate,
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Updated task", body = TaskRecordResponse),
        (status = 403, description = "Not an admin or the assignee"),
        (status = 404, description = "Task not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_task(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<i64>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<TaskRecordResponse>> {
    let task = team_task(&state, &current_user, id).await?;
    require_admin_or_assignee(&current_user, &task)?;

    let task = Tasks::new(&state.store).update(id, &update.into()).await?;
    Ok(Json(TaskRecordResponse {
        success: true,
        record: task.into(),
    }))
}

/// Move a task through its workflow
#[utoipa::path(
    patch,
    path = "/tasks/{id}/status",
    request_body = TaskStatusUpdate,
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Updated task", body = TaskRecordResponse),
        (status = 403, description = "Not an admin or the assignee"),
        (status = 404, description = "Task not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_task_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<i64>,
    Json(update): Json<TaskStatusUpdate>,
) -> Result<Json<TaskRecordResponse>> {
    let task = team_task(&state, &current_user, id).await?;
    require_admin_or_assignee(&current_user, &task)?;

    let request = TaskUpdateDBRequest {
        status: Some(update.status),
        feedback: update.feedback,
        ..Default::default()
    };
    let task = Tasks::new(&state.store).update(id, &request).await?;
    info!(task_id = id, status = ?task.status, "Task status changed");
    Ok(Json(TaskRecordResponse {
        success: true,
        record: task.into(),
    }))
}

/// Delete a task
#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted", body = SuccessResponse),
        (status = 404, description = "Task not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_task(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>> {
    require_admin(&current_user)?;
    team_task(&state, &current_user, id).await?;
    Tasks::new(&state.store).delete(id).await?;
    Ok(Json(SuccessResponse::ok()))
}
