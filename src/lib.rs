pub mod adapters;
pub mod cli;
pub mod config;
pub mod context;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod validation;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::ports::Store;
use crate::services::{OrderLedger, PaymentSettlement};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub orders: OrderLedger,
    pub payments: PaymentSettlement,
    pub auth_secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, auth_secret: &str) -> Self {
        Self {
            orders: OrderLedger::new(store.clone()),
            payments: PaymentSettlement::new(store.clone()),
            store,
            auth_secret: Arc::from(auth_secret),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::place_order),
        )
        .route("/orders/status", get(handlers::orders::list_statuses))
        .route(
            "/orders/:id",
            put(handlers::orders::update_quantity).delete(handlers::orders::cancel_order),
        )
        .route("/payment", get(handlers::payments::list_payments))
        .route("/payment/pay_order/:id", post(handlers::payments::pay_order))
        .route("/payment/:id", delete(handlers::payments::delete_payment))
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
