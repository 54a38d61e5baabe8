//! Read-model projections returned by listing endpoints. They are assembled
//! by the storage adapters from joined rows, never by walking entity graphs.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderView {
    pub order_id: i64,
    pub status: String,
    pub is_paid: bool,
    pub is_in_cart: bool,
    pub line_id: i64,
    pub product_id: i64,
    pub product_title: String,
    pub unit_price: BigDecimal,
    pub quantity: i32,
    pub price: BigDecimal,
    pub address_id: i64,
    pub address_name: String,
    pub ordered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentView {
    pub payment_id: i64,
    pub order_line_id: i64,
    pub product_title: String,
    pub account_number: String,
    pub amount: i32,
    pub price: BigDecimal,
    pub paid_at: DateTime<Utc>,
}
