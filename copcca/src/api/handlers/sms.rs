//! SMS settings, credits and sending for debt collection.

use axum::{Json, extract::State};
use tracing::info;

use crate::{
    AppState,
    api::models::{
        messaging::{
            BulkSmsRequest, BulkSmsResponse, DebtReminderSmsRequest, MASKED_SECRET, PaymentConfirmationSmsRequest,
            SendSmsResponse, SmsCreditsResponse, SmsSettingsResponse, TopUpCreditsRequest,
        },
        users::CurrentUser,
    },
    auth::current_user::{require_admin, require_platform_admin},
    db::{handlers::SmsAccounts, models::sms::SmsSettings},
    errors::{Error, Result},
    messaging::sms::{OutgoingSms, SmsGateway, SmsStats, debt_reminder_message, payment_confirmation_message},
};

fn gateway(state: &AppState) -> SmsGateway<'_> {
    SmsGateway::new(&state.store, &state.http, &state.config.sms)
}

#[utoipa::path(
    get,
    path = "/sms/settings",
    tag = "sms",
    responses((status = 200, description = "Team SMS settings", body = SmsSettingsResponse)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_sms_settings(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<SmsSettingsResponse>> {
    let settings = SmsAccounts::new(&state.store).settings(&current_user.team_id).await?;
    Ok(Json(settings.into()))
}

/// Replace the team's SMS settings
///
/// Sending the masked token back (or omitting it) keeps the stored one.
#[utoipa::path(
    put,
    path = "/sms/settings",
    tag = "sms",
    request_body = SmsSettings,
    responses(
        (status = 200, description = "Saved settings", body = SmsSettingsResponse),
        (status = 403, description = "Admin access required"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_sms_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(mut settings): Json<SmsSettings>,
) -> Result<Json<SmsSettingsResponse>> {
    require_admin(&current_user)?;
    let mut accounts = SmsAccounts::new(&state.store);

    if settings.twilio_auth_token.as_deref().is_none_or(|t| t == MASKED_SECRET) {
        settings.twilio_auth_token = accounts.settings(&current_user.team_id).await?.twilio_auth_token;
    }
    if settings.reminder_interval_days == 0 {
        settings.reminder_interval_days = state.config.sms.default_reminder_interval_days;
    }

    accounts.save_settings(&current_user.team_id, &settings).await?;
    info!(team_id = %current_user.team_id, enabled = settings.enabled(), "SMS settings saved");
    Ok(Json(settings.into()))
}

#[utoipa::path(
    get,
    path = "/sms/credits",
    tag = "sms",
    responses((status = 200, description = "Credit balance", body = SmsCreditsResponse)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_sms_credits(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<SmsCreditsResponse>> {
    let credits = SmsAccounts::new(&state.store).credits(&current_user.team_id).await?;
    Ok(Json(SmsCreditsResponse { credits }))
}

/// Add credits to any team's balance
#[utoipa::path(
    post,
    path = "/admin/sms/credits",
    tag = "admin",
    request_body = TopUpCreditsRequest,
    responses(
        (status = 200, description = "New balance", body = SmsCreditsResponse),
        (status = 400, description = "Amount must be positive"),
        (status = 403, description = "Platform admin access required"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn top_up_sms_credits(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<TopUpCreditsRequest>,
) -> Result<Json<SmsCreditsResponse>> {
    require_platform_admin(&current_user, &state.config)?;
    if request.amount <= rust_decimal::Decimal::ZERO {
        return Err(Error::bad_request("Amount must be positive"));
    }
    let credits = SmsAccounts::new(&state.store).top_up(&request.team_id, request.amount).await?;
    info!(team_id = %request.team_id, amount = %request.amount, by = %current_user.email, "SMS credits topped up");
    Ok(Json(SmsCreditsResponse { credits }))
}

/// Send one SMS
///
/// Delivery problems such as a malformed number come back as an unsuccessful result; only a
/// missing balance is an error.
#[utoipa::path(
    post,
    path = "/sms/send",
    tag = "sms",
    request_body = OutgoingSms,
    responses(
        (status = 200, description = "Send result", body = SendSmsResponse),
        (status = 402, description = "Insufficient SMS credits"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_sms(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(message): Json<OutgoingSms>,
) -> Result<Json<SendSmsResponse>> {
    let result = gateway(&state)
        .send(&current_user.team_id, Some(current_user.id), &message)
        .await?;
    Ok(Json(SendSmsResponse { result }))
}

#[utoipa::path(
    post,
    path = "/sms/send-bulk",
    tag = "sms",
    request_body = BulkSmsRequest,
    responses((status = 200, description = "Per-message results", body = BulkSmsResponse)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_bulk_sms(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<BulkSmsRequest>,
) -> Result<Json<BulkSmsResponse>> {
    let results = gateway(&state)
        .send_bulk(&current_user.team_id, Some(current_user.id), &request.messages)
        .await?;
    Ok(Json(BulkSmsResponse::new(results)))
}

/// Remind a customer of an overdue invoice
///
/// The message uses the team's language unless the request names one.
#[utoipa::path(
    post,
    path = "/sms/debt-reminder",
    tag = "sms",
    request_body = DebtReminderSmsRequest,
    responses(
        (status = 200, description = "Send result", body = SendSmsResponse),
        (status = 402, description = "Insufficient SMS credits"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_debt_reminder(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<DebtReminderSmsRequest>,
) -> Result<Json<SendSmsResponse>> {
    let language = match request.language {
        Some(language) => language,
        None => SmsAccounts::new(&state.store).settings(&current_user.team_id).await?.language,
    };
    let message = OutgoingSms {
        body: debt_reminder_message(
            &request.customer_name,
            &request.invoice_number,
            &request.amount,
            request.days_overdue,
            language,
        ),
        to: request.phone_number,
        debt_id: request.debt_id,
        invoice_number: Some(request.invoice_number),
    };
    let result = gateway(&state)
        .send(&current_user.team_id, Some(current_user.id), &message)
        .await?;
    Ok(Json(SendSmsResponse { result }))
}

#[utoipa::path(
    post,
    path = "/sms/payment-confirmation",
    tag = "sms",
    request_body = PaymentConfirmationSmsRequest,
    responses(
        (status = 200, description = "Send result", body = SendSmsResponse),
        (status = 402, description = "Insufficient SMS credits"),
    ),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_payment_confirmation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<PaymentConfirmationSmsRequest>,
) -> Result<Json<SendSmsResponse>> {
    let language = match request.language {
        Some(language) => language,
        None => SmsAccounts::new(&state.store).settings(&current_user.team_id).await?.language,
    };
    let message = OutgoingSms {
        body: payment_confirmation_message(&request.customer_name, &request.invoice_number, &request.amount, language),
        to: request.phone_number,
        debt_id: request.debt_id,
        invoice_number: Some(request.invoice_number),
    };
    let result = gateway(&state)
        .send(&current_user.team_id, Some(current_user.id), &message)
        .await?;
    Ok(Json(SendSmsResponse { result }))
}

#[utoipa::path(
    get,
    path = "/sms/stats",
    tag = "sms",
    responses((status = 200, description = "Delivery statistics", body = SmsStats)),
    security(("session_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn sms_stats(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<SmsStats>> {
    let logs = SmsAccounts::new(&state.store).logs(&current_user.team_id).await?;
    Ok(Json(SmsStats::from_logs(&logs)))
}
