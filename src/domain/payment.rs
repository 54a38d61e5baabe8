//! Payment record. Created once per successful settlement and never updated,
//! apart from the `is_deleted` visibility flag.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub order_line_id: i64,
    pub account_id: i64,
    /// Units paid for.
    pub amount: i32,
    /// Total charged.
    pub price: BigDecimal,
    pub paid_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: i64,
    pub order_line_id: i64,
    pub account_id: i64,
    pub amount: i32,
    pub price: BigDecimal,
}
