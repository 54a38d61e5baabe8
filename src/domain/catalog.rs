//! Collaborator entities owned by the catalog, address book and account store.
//! The engine only reads them, except for `Product::stock` and
//! `Account::balance`, which it mutates inside a unit of work.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub address_name: String,
    pub is_deleted: bool,
}

/// A sellable product. `stock` never goes below zero; a product whose stock
/// reaches zero is soft-deleted so it can no longer be ordered.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub seller_id: i64,
    pub title: String,
    pub price: BigDecimal,
    pub stock: i32,
    pub default_account_id: Option<i64>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn is_available(&self) -> bool {
        !self.is_deleted
    }
}

/// A funding or settlement account.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub account_number: String,
    pub balance: BigDecimal,
    pub is_deleted: bool,
}

impl Account {
    pub fn covers(&self, amount: &BigDecimal) -> bool {
        &self.balance >= amount
    }
}
