use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::context::RequestContext;
use crate::error::AppError;
use crate::validation::{normalize_account_number, parse_optional_body};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PayOrderRequest {
    pub account_number: Option<String>,
}

pub async fn list_payments(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    let payments = state.payments.list_payments(&ctx).await?;
    Ok(Json(payments))
}

/// The body is optional; without it the first account able to cover the
/// order total is charged. A body that is present must be valid JSON.
pub async fn pay_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(order_id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload: PayOrderRequest = parse_optional_body(&body)?;
    let account_number = normalize_account_number(payload.account_number.as_deref())?;

    let payment = state
        .payments
        .pay(&ctx, order_id, account_number.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(payment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.payments.delete_payment(&ctx, payment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
