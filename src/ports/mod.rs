//! Storage ports.
//!
//! A [`Store`] hands out [`UnitOfWork`]s. Everything done through a unit of
//! work becomes visible atomically on [`UnitOfWork::commit`]; dropping it
//! without committing discards every write. The `lock_*` methods take a
//! row lock that is held until the unit of work ends, so two units of work
//! contending for the same product, order or account are serialized.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use thiserror::Error;

use crate::domain::{
    Account, Address, NewOrder, NewOrderLine, NewPayment, Order, OrderLine, OrderStatus,
    OrderStatusKind, OrderView, Payment, PaymentView, Product, UserProfile,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("unit of work already finished")]
    Finished,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> RepositoryResult<Box<dyn UnitOfWork>>;

    async fn ping(&self) -> RepositoryResult<()>;

    async fn user(&self, user_id: i64) -> RepositoryResult<Option<UserProfile>>;

    /// In-cart orders of a buyer whose line has not been cancelled.
    async fn orders_for_buyer(&self, user_id: i64) -> RepositoryResult<Vec<OrderView>>;

    /// Orders placed on products sold by `seller_id`, excluding cancelled lines.
    async fn orders_for_seller(&self, seller_id: i64) -> RepositoryResult<Vec<OrderView>>;

    async fn order_statuses(&self) -> RepositoryResult<Vec<OrderStatus>>;

    /// Visible payments of a user, newest first.
    async fn payments_for_user(&self, user_id: i64) -> RepositoryResult<Vec<PaymentView>>;

    /// Hides a payment. Returns `false` when no visible payment of `user_id`
    /// has this id.
    async fn hide_payment(&self, payment_id: i64, user_id: i64) -> RepositoryResult<bool>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    async fn find_user(&mut self, user_id: i64) -> RepositoryResult<Option<UserProfile>>;

    /// A non-deleted address owned by `user_id`.
    async fn find_address(
        &mut self,
        address_id: i64,
        user_id: i64,
    ) -> RepositoryResult<Option<Address>>;

    /// Non-deleted addresses of `user_id` in ascending id order.
    async fn addresses_for_user(&mut self, user_id: i64) -> RepositoryResult<Vec<Address>>;

    /// Reads a product regardless of its soft-delete flag.
    async fn find_product(&mut self, product_id: i64) -> RepositoryResult<Option<Product>>;

    async fn lock_product(&mut self, product_id: i64) -> RepositoryResult<Option<Product>>;

    async fn update_product_stock(
        &mut self,
        product_id: i64,
        stock: i32,
        is_deleted: bool,
    ) -> RepositoryResult<()>;

    async fn status_id(&mut self, status: OrderStatusKind) -> RepositoryResult<i64>;

    async fn insert_order_line(&mut self, line: &NewOrderLine) -> RepositoryResult<OrderLine>;

    async fn insert_order(&mut self, order: &NewOrder) -> RepositoryResult<Order>;

    async fn lock_order(&mut self, order_id: i64) -> RepositoryResult<Option<Order>>;

    async fn find_order_line(&mut self, line_id: i64) -> RepositoryResult<Option<OrderLine>>;

    async fn update_order_line(
        &mut self,
        line_id: i64,
        quantity: i32,
        price: &BigDecimal,
    ) -> RepositoryResult<OrderLine>;

    async fn cancel_order_line(&mut self, line_id: i64) -> RepositoryResult<()>;

    async fn mark_order_paid(&mut self, order_id: i64, status_id: i64) -> RepositoryResult<Order>;

    /// Non-deleted accounts of `user_id` in ascending id order.
    async fn accounts_for_user(&mut self, user_id: i64) -> RepositoryResult<Vec<Account>>;

    async fn find_account(&mut self, account_id: i64) -> RepositoryResult<Option<Account>>;

    /// Locks the given accounts in ascending id order and returns them in
    /// that order. Ids are deduplicated.
    async fn lock_accounts(&mut self, account_ids: &[i64]) -> RepositoryResult<Vec<Account>>;

    async fn update_account_balance(
        &mut self,
        account_id: i64,
        balance: &BigDecimal,
    ) -> RepositoryResult<()>;

    async fn insert_payment(&mut self, payment: &NewPayment) -> RepositoryResult<Payment>;

    async fn commit(&mut self) -> RepositoryResult<()>;
}
