use axum::Json;

use crate::{
    api::models::subscriptions::{ConvertRequest, ConvertResponse, CurrencyListResponse, CurrencyResponse},
    currency::{CURRENCIES, convert_amount, find_or_usd, format_currency},
    errors::{Error, Result},
};

/// List supported currencies
#[utoipa::path(
    get,
    path = "/currencies",
    tag = "currencies",
    responses(
        (status = 200, description = "Supported currencies with their USD rates", body = CurrencyListResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_currencies() -> Json<CurrencyListResponse> {
    Json(CurrencyListResponse {
        currencies: CURRENCIES.iter().map(CurrencyResponse::from).collect(),
    })
}

/// Convert an amount between currencies
///
/// Unknown codes are treated as USD.
#[utoipa::path(
    post,
    path = "/currencies/convert",
    request_body = ConvertRequest,
    tag = "currencies",
    responses(
        (status = 200, description = "Converted amount", body = ConvertResponse),
        (status = 400, description = "Amount is not a finite number"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn convert(Json(request): Json<ConvertRequest>) -> Result<Json<ConvertResponse>> {
    if !request.amount.is_finite() {
        return Err(Error::bad_request("Amount must be a number"));
    }
    let amount = convert_amount(request.amount, &request.from, &request.to);
    Ok(Json(ConvertResponse {
        amount,
        formatted: format_currency(amount, find_or_usd(&request.to)),
    }))
}
