//! Record collections, the activity feed and debt follow-up reminders.
//!
//! Writes always go to the caller's own collections. Reads may widen to a teammate
//! (`userId`) or the whole team (`all=true`) for admins; merged views tag every entry with its
//! owner.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::debug;

use crate::{
    AppState,
    api::{
        handlers::users::{require_teammate, team_members},
        models::{
            records::{
                ActivitiesQuery, ActivityListResponse, ActivityResponse, DebtRemindersResponse, RecordListResponse,
                RecordResponse, RecordsQuery,
            },
            users::{CurrentUser, SuccessResponse},
        },
    },
    auth::current_user::require_admin,
    db::{
        errors::DbError,
        handlers::{Activities, Records, records::annotate_owner},
        models::records::{Collection, Record, RecordChange, describe_change},
    },
    errors::{Error, Result},
    reminders::DebtReminderChecker,
    types::abbrev_uuid,
};

/// Entries returned by the activity feed at most
const MAX_FEED_ENTRIES: usize = 50;

fn parse_collection(raw: &str) -> Result<Collection> {
    raw.parse().map_err(Error::bad_request)
}

fn record_not_found(id: i64) -> impl FnOnce(DbError) -> Error {
    move |e| match e {
        DbError::NotFound => Error::NotFound {
            resource: "Record".to_string(),
            id: id.to_string(),
        },
        other => other.into(),
    }
}

/// List records of a collection
#[utoipa::path(
    get,
    path = "/records/{collection}",
    tag = "records",
    params(("collection" = Collection, Path, description = "Collection name"), RecordsQuery),
    responses(
        (status = 200, description = "Records", body = RecordListResponse),
        (status = 400, description = "Unknown collection"),
        (status = 403, description = "Not allowed to read that user's records"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_records(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(collection): Path<String>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<RecordListResponse>> {
    let collection = parse_collection(&collection)?;
    let mut repo = Records::new(&state.store);

    if query.all {
        require_admin(&current_user)?;
        let mut records = Vec::new();
        for member in team_members(&state, &current_user.team_id).await? {
            let owned = repo.list(collection, &member.id).await?;
            records.extend(
                owned
                    .into_iter()
                    .map(|r| annotate_owner(r, &member.id, Some(&member.name), Some(&member.email))),
            );
        }
        debug!(count = records.len(), "Merged team records");
        return Ok(Json(RecordListResponse { records }));
    }

    let owner = match query.user_id {
        Some(user_id) if user_id != current_user.id => require_teammate(&state, &current_user, user_id).await?.id,
        _ => current_user.id,
    };
    let records = repo.list(collection, &owner).await?;
    Ok(Json(RecordListResponse { records }))
}

/// Add a record to one of the caller's collections
///
/// The server assigns `id`, `createdAt` and `updatedAt`; every other field is stored as sent.
#[utoipa::path(
    post,
    path = "/records/{collection}",
    tag = "records",
    params(("collection" = Collection, Path, description = "Collection name")),
    request_body = Object,
    responses(
        (status = 201, description = "Record created", body = RecordResponse),
        (status = 400, description = "Unknown collection"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_record(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(collection): Path<String>,
    Json(record): Json<Record>,
) -> Result<(StatusCode, Json<RecordResponse>)> {
    let collection = parse_collection(&collection)?;
    let record = Records::new(&state.store)
        .create(collection, &current_user.id, record)
        .await?;

    Activities::new(&state.store)
        .log(&current_user.id, describe_change(collection, RecordChange::Created(&record)))
        .await;
    debug!(user_id = %abbrev_uuid(&current_user.id), "Record created");
    Ok((StatusCode::CREATED, Json(RecordResponse { record })))
}

/// Merge fields into a record
#[utoipa::path(
    put,
    path = "/records/{collection}/{id}",
    tag = "records",
    params(
        ("collection" = Collection, Path, description = "Collection name"),
        ("id" = i64, Path, description = "Record id"),
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Merged record", body = RecordResponse),
        (status = 404, description = "Record not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_record(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((collection, id)): Path<(String, i64)>,
    Json(updates): Json<Record>,
) -> Result<Json<RecordResponse>> {
    let collection = parse_collection(&collection)?;
    let record = Records::new(&state.store)
        .update(collection, &current_user.id, id, &updates)
        .await
        .map_err(record_not_found(id))?;

    Activities::new(&state.store)
        .log(
            &current_user.id,
            describe_change(collection, RecordChange::Updated { record: &record, updates: &updates }),
        )
        .await;
    Ok(Json(RecordResponse { record }))
}

/// Delete a record
#[utoipa::path(
    delete,
    path = "/records/{collection}/{id}",
    tag = "records",
    params(
        ("collection" = Collection, Path, description = "Collection name"),
        ("id" = i64, Path, description = "Record id"),
    ),
    responses(
        (status = 200, description = "Record deleted", body = SuccessResponse),
        (status = 404, description = "Record not found"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_record(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((collection, id)): Path<(String, i64)>,
) -> Result<Json<SuccessResponse>> {
    let collection = parse_collection(&collection)?;
    let removed = Records::new(&state.store)
        .delete(collection, &current_user.id, id)
        .await
        .map_err(record_not_found(id))?;

    Activities::new(&state.store)
        .log(
            &current_user.id,
            describe_change(collection, RecordChange::Deleted { id, record: &removed }),
        )
        .await;
    Ok(Json(SuccessResponse::ok()))
}

/// Read the activity feed
#[utoipa::path(
    get,
    path = "/activities",
    tag = "records",
    params(ActivitiesQuery),
    responses(
        (status = 200, description = "Activities, newest first", body = ActivityListResponse),
        (status = 403, description = "Not allowed to read that user's feed"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_activities(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ActivitiesQuery>,
) -> Result<Json<ActivityListResponse>> {
    let limit = query.limit.unwrap_or(MAX_FEED_ENTRIES).min(MAX_FEED_ENTRIES);
    let mut repo = Activities::new(&state.store);

    if query.all {
        require_admin(&current_user)?;
        let mut activities = Vec::new();
        for member in team_members(&state, &current_user.team_id).await? {
            for activity in repo.list(&member.id, limit).await? {
                let mut activity = ActivityResponse::from(activity);
                activity.user_name = Some(member.name.clone());
                activity.user_email = Some(member.email.clone());
                activities.push(activity);
            }
        }
        activities.sort_by(|a, b| b.time.cmp(&a.time));
        activities.truncate(limit);
        return Ok(Json(ActivityListResponse { activities }));
    }

    let owner = match query.user_id {
        Some(user_id) if user_id != current_user.id => require_teammate(&state, &current_user, user_id).await?.id,
        _ => current_user.id,
    };
    let activities = repo
        .list(&owner, limit)
        .await?
        .into_iter()
        .map(ActivityResponse::from)
        .collect();
    Ok(Json(ActivityListResponse { activities }))
}

/// Debt follow-ups due soon or already missed
#[utoipa::path(
    get,
    path = "/debt/reminders",
    tag = "records",
    responses(
        (status = 200, description = "Upcoming and overdue follow-ups", body = DebtRemindersResponse),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn debt_reminders(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<DebtRemindersResponse>> {
    let records = Records::new(&state.store)
        .list(Collection::Debt, &current_user.id)
        .await?;
    let checker = DebtReminderChecker::new(state.config.reminders.lookahead);
    let now = Utc::now();
    Ok(Json(DebtRemindersResponse {
        upcoming: checker.upcoming(&records, now),
        overdue: checker.overdue(&records, now),
    }))
}
