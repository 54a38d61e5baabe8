use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::context::RequestContext;
use crate::error::AppError;
use crate::services::PlaceOrder;
use crate::validation::validate_id;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub product_id: i64,
    pub address_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    /// Signed change applied to the current quantity.
    pub quantity: i32,
}

pub async fn place_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_id("product_id", payload.product_id)?;

    let receipt = state
        .orders
        .place_order(
            &ctx,
            PlaceOrder {
                product_id: payload.product_id,
                address_id: payload.address_id,
                quantity: payload.quantity,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    let orders = state.orders.list_orders(&ctx).await?;
    Ok(Json(orders))
}

pub async fn update_quantity(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(order_id): Path<i64>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state
        .orders
        .update_quantity(&ctx, order_id, payload.quantity)
        .await?;
    Ok(Json(receipt))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(order_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.orders.cancel(&ctx, order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_statuses(
    State(state): State<AppState>,
    _ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    let statuses = state.orders.statuses().await?;
    Ok(Json(statuses))
}
