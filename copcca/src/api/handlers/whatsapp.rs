//! WhatsApp relay on the platform's messaging account.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        messaging::{
            WhatsAppBulkRequest, WhatsAppBulkResponse, WhatsAppSendRequest, WhatsAppTemplateRequest, WhatsAppValidateRequest,
            WhatsAppValidateResponse,
        },
        users::CurrentUser,
    },
    db::{
        handlers::Activities,
        models::activities::{ActivityCreateDBRequest, Priority},
    },
    errors::{Error, Result},
    messaging::whatsapp::{WhatsAppResult, WhatsAppSender, format_number, is_valid_number},
};

fn sender(state: &AppState) -> Result<WhatsAppSender> {
    WhatsAppSender::from_config(&state.config.whatsapp, state.http.clone())
}

async fn log_whatsapp(state: &AppState, current_user: &CurrentUser, action: &str, details: String, priority: Priority) {
    Activities::new(&state.store)
        .log(&current_user.id, ActivityCreateDBRequest::new("WhatsApp", action, details, priority))
        .await;
}

#[utoipa::path(
    post,
    path = "/whatsapp/send",
    tag = "whatsapp",
    request_body = WhatsAppSendRequest,
    responses(
        (status = 200, description = "Send result", body = WhatsAppResult),
        (status = 400, description = "Recipient and message are required"),
        (status = 503, description = "WhatsApp is not configured"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_whatsapp(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<WhatsAppSendRequest>,
) -> Result<Json<WhatsAppResult>> {
    if request.to.trim().is_empty() || request.message.trim().is_empty() {
        return Err(Error::bad_request("Recipient and message are required"));
    }
    let sender = sender(&state)?;
    let result = sender.send(&request.to, &request.message).await;
    log_whatsapp(&state, &current_user, "Sent message", format!("To {}", request.to), Priority::Medium).await;
    Ok(Json(result))
}

/// Send the same message to several numbers, pausing between sends
#[utoipa::path(
    post,
    path = "/whatsapp/send-bulk",
    tag = "whatsapp",
    request_body = WhatsAppBulkRequest,
    responses(
        (status = 200, description = "Per-recipient results", body = WhatsAppBulkResponse),
        (status = 503, description = "WhatsApp is not configured"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_whatsapp_bulk(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<WhatsAppBulkRequest>,
) -> Result<Json<WhatsAppBulkResponse>> {
    if request.recipients.is_empty() || request.message.trim().is_empty() {
        return Err(Error::bad_request("Recipients and message are required"));
    }
    let sender = sender(&state)?;
    let response = WhatsAppBulkResponse::new(sender.send_bulk(&request.recipients, &request.message).await);
    log_whatsapp(
        &state,
        &current_user,
        "Sent bulk messages",
        format!("{} sent, {} failed", response.sent, response.failed),
        Priority::High,
    )
    .await;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/whatsapp/validate",
    tag = "whatsapp",
    request_body = WhatsAppValidateRequest,
    responses((status = 200, description = "Normalised number", body = WhatsAppValidateResponse)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn validate_whatsapp_number(
    _current_user: CurrentUser,
    Json(request): Json<WhatsAppValidateRequest>,
) -> Json<WhatsAppValidateResponse> {
    Json(WhatsAppValidateResponse {
        valid: is_valid_number(&request.phone),
        formatted: format_number(&request.phone),
    })
}

#[utoipa::path(
    post,
    path = "/whatsapp/send-template",
    tag = "whatsapp",
    request_body = WhatsAppTemplateRequest,
    responses(
        (status = 200, description = "Send result", body = WhatsAppResult),
        (status = 503, description = "WhatsApp is not configured"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_whatsapp_template(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<WhatsAppTemplateRequest>,
) -> Result<Json<WhatsAppResult>> {
    if request.to.trim().is_empty() || request.template_name.trim().is_empty() {
        return Err(Error::bad_request("Recipient and template name are required"));
    }
    let sender = sender(&state)?;
    let result = sender
        .send_template(&request.to, &request.template_name, &request.parameters)
        .await;
    log_whatsapp(
        &state,
        &current_user,
        "Sent template message",
        format!("{} to {}", request.template_name, request.to),
        Priority::Medium,
    )
    .await;
    Ok(Json(result))
}
