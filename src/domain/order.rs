//! Order and order-line entities.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Well-known rows of the `order_statuses` lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusKind {
    Placed,
    InCart,
    Paid,
}

impl OrderStatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatusKind::Placed => "placed",
            OrderStatusKind::InCart => "in cart",
            OrderStatusKind::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderStatus {
    pub id: i64,
    pub status_name: String,
    pub description: String,
}

/// A single line item. `price` is always `unit_price * quantity`, where
/// `unit_price` is the product price captured when the order was placed.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderLine {
    pub id: i64,
    pub product_id: i64,
    pub unit_price: BigDecimal,
    pub quantity: i32,
    pub price: BigDecimal,
    pub address_id: i64,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    /// Total for `quantity` units at the captured unit price.
    pub fn total_for(&self, quantity: i32) -> BigDecimal {
        &self.unit_price * BigDecimal::from(quantity)
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: i64,
    pub unit_price: BigDecimal,
    pub quantity: i32,
    pub price: BigDecimal,
    pub address_id: i64,
}

/// An order owns exactly one line. Once `is_paid` is set the line is frozen.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub line_id: i64,
    pub status_id: i64,
    pub is_paid: bool,
    pub is_in_cart: bool,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub line_id: i64,
    pub status_id: i64,
}
