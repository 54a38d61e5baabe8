//! Postgres implementation of the storage ports.
//!
//! Every unit of work is a single database transaction. Contended rows are
//! taken with `SELECT ... FOR UPDATE`; accounts are always locked in
//! ascending id order. Dropping a unit of work before `commit` rolls the
//! transaction back.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::postgres::PgConnection;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{
    Account, Address, NewOrder, NewOrderLine, NewPayment, Order, OrderLine, OrderStatus,
    OrderStatusKind, OrderView, Payment, PaymentView, Product, UserProfile,
};
use crate::ports::{RepositoryError, RepositoryResult, Store, UnitOfWork};

const ORDER_VIEW_SELECT: &str = r#"
    SELECT o.id AS order_id, s.status_name AS status, o.is_paid, o.is_in_cart,
           l.id AS line_id, p.id AS product_id, p.title AS product_title,
           l.unit_price, l.quantity, l.price,
           a.id AS address_id, a.address_name, l.created_at AS ordered_at
    FROM orders o
    JOIN order_statuses s ON s.id = o.status_id
    JOIN order_lines l ON l.id = o.line_id
    JOIN products p ON p.id = l.product_id
    JOIN addresses a ON a.id = l.address_id
"#;

/// Postgres-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> RepositoryResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresUnitOfWork { tx: Some(tx) }))
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn user(&self, user_id: i64) -> RepositoryResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserProfile>(
            "SELECT id, username, is_admin FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn orders_for_buyer(&self, user_id: i64) -> RepositoryResult<Vec<OrderView>> {
        let sql = format!(
            "{} WHERE o.user_id = $1 AND o.is_in_cart AND NOT l.is_deleted ORDER BY o.id",
            ORDER_VIEW_SELECT
        );
        let rows = sqlx::query_as::<_, OrderView>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn orders_for_seller(&self, seller_id: i64) -> RepositoryResult<Vec<OrderView>> {
        let sql = format!(
            "{} WHERE p.seller_id = $1 AND NOT l.is_deleted ORDER BY o.id",
            ORDER_VIEW_SELECT
        );
        let rows = sqlx::query_as::<_, OrderView>(&sql)
            .bind(seller_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn order_statuses(&self) -> RepositoryResult<Vec<OrderStatus>> {
        let rows = sqlx::query_as::<_, OrderStatus>(
            "SELECT id, status_name, description FROM order_statuses ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn payments_for_user(&self, user_id: i64) -> RepositoryResult<Vec<PaymentView>> {
        let rows = sqlx::query_as::<_, PaymentView>(
            r#"
            SELECT pay.id AS payment_id, l.id AS order_line_id, p.title AS product_title,
                   a.account_number, pay.amount, pay.price, pay.paid_at
            FROM payments pay
            JOIN order_lines l ON l.id = pay.order_line_id
            JOIN products p ON p.id = l.product_id
            JOIN accounts a ON a.id = pay.account_id
            WHERE pay.user_id = $1 AND NOT pay.is_deleted
            ORDER BY pay.paid_at DESC, pay.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn hide_payment(&self, payment_id: i64, user_id: i64) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE payments SET is_deleted = TRUE WHERE id = $1 AND user_id = $2 AND NOT is_deleted",
        )
        .bind(payment_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

pub struct PostgresUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresUnitOfWork {
    fn conn(&mut self) -> RepositoryResult<&mut PgConnection> {
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(RepositoryError::Finished),
        }
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn find_user(&mut self, user_id: i64) -> RepositoryResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserProfile>(
            "SELECT id, username, is_admin FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn find_address(
        &mut self,
        address_id: i64,
        user_id: i64,
    ) -> RepositoryResult<Option<Address>> {
        let row = sqlx::query_as::<_, Address>(
            r#"
            SELECT id, user_id, address_name, is_deleted FROM addresses
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            "#,
        )
        .bind(address_id)
        .bind(user_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn addresses_for_user(&mut self, user_id: i64) -> RepositoryResult<Vec<Address>> {
        let rows = sqlx::query_as::<_, Address>(
            r#"
            SELECT id, user_id, address_name, is_deleted FROM addresses
            WHERE user_id = $1 AND NOT is_deleted
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.conn()?)
        .await?;
        Ok(rows)
    }

    async fn find_product(&mut self, product_id: i64) -> RepositoryResult<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, seller_id, title, price, stock, default_account_id, is_deleted, created_at
            FROM products WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn lock_product(&mut self, product_id: i64) -> RepositoryResult<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, seller_id, title, price, stock, default_account_id, is_deleted, created_at
            FROM products WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(product_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn update_product_stock(
        &mut self,
        product_id: i64,
        stock: i32,
        is_deleted: bool,
    ) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE products SET stock = $1, is_deleted = $2 WHERE id = $3")
            .bind(stock)
            .bind(is_deleted)
            .bind(product_id)
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("product {}", product_id)));
        }
        Ok(())
    }

    async fn status_id(&mut self, status: OrderStatusKind) -> RepositoryResult<i64> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM order_statuses WHERE status_name = $1")
                .bind(status.as_str())
                .fetch_optional(self.conn()?)
                .await?;
        id.ok_or_else(|| {
            RepositoryError::Integrity(format!("order status '{}' is missing", status.as_str()))
        })
    }

    async fn insert_order_line(&mut self, line: &NewOrderLine) -> RepositoryResult<OrderLine> {
        let row = sqlx::query_as::<_, OrderLine>(
            r#"
            INSERT INTO order_lines (product_id, unit_price, quantity, price, address_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, product_id, unit_price, quantity, price, address_id, is_deleted, created_at
            "#,
        )
        .bind(line.product_id)
        .bind(&line.unit_price)
        .bind(line.quantity)
        .bind(&line.price)
        .bind(line.address_id)
        .fetch_one(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn insert_order(&mut self, order: &NewOrder) -> RepositoryResult<Order> {
        let row = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (user_id, line_id, status_id)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, line_id, status_id, is_paid, is_in_cart
            "#,
        )
        .bind(order.user_id)
        .bind(order.line_id)
        .bind(order.status_id)
        .fetch_one(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn lock_order(&mut self, order_id: i64) -> RepositoryResult<Option<Order>> {
        let row = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, line_id, status_id, is_paid, is_in_cart
            FROM orders WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn find_order_line(&mut self, line_id: i64) -> RepositoryResult<Option<OrderLine>> {
        let row = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT id, product_id, unit_price, quantity, price, address_id, is_deleted, created_at
            FROM order_lines WHERE id = $1
            "#,
        )
        .bind(line_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn update_order_line(
        &mut self,
        line_id: i64,
        quantity: i32,
        price: &BigDecimal,
    ) -> RepositoryResult<OrderLine> {
        let row = sqlx::query_as::<_, OrderLine>(
            r#"
            UPDATE order_lines SET quantity = $1, price = $2
            WHERE id = $3
            RETURNING id, product_id, unit_price, quantity, price, address_id, is_deleted, created_at
            "#,
        )
        .bind(quantity)
        .bind(price)
        .bind(line_id)
        .fetch_optional(self.conn()?)
        .await?;
        row.ok_or_else(|| RepositoryError::NotFound(format!("order line {}", line_id)))
    }

    async fn cancel_order_line(&mut self, line_id: i64) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE order_lines SET is_deleted = TRUE WHERE id = $1")
            .bind(line_id)
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("order line {}", line_id)));
        }
        Ok(())
    }

    async fn mark_order_paid(&mut self, order_id: i64, status_id: i64) -> RepositoryResult<Order> {
        let row = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders SET is_paid = TRUE, is_in_cart = FALSE, status_id = $1
            WHERE id = $2
            RETURNING id, user_id, line_id, status_id, is_paid, is_in_cart
            "#,
        )
        .bind(status_id)
        .bind(order_id)
        .fetch_optional(self.conn()?)
        .await?;
        row.ok_or_else(|| RepositoryError::NotFound(format!("order {}", order_id)))
    }

    async fn accounts_for_user(&mut self, user_id: i64) -> RepositoryResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, account_number, balance, is_deleted FROM accounts
            WHERE user_id = $1 AND NOT is_deleted
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.conn()?)
        .await?;
        Ok(rows)
    }

    async fn find_account(&mut self, account_id: i64) -> RepositoryResult<Option<Account>> {
        let row = sqlx::query_as::<_, Account>(
            "SELECT id, user_id, account_number, balance, is_deleted FROM accounts WHERE id = $1",
        )
        .bind(account_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn lock_accounts(&mut self, account_ids: &[i64]) -> RepositoryResult<Vec<Account>> {
        let mut ids = account_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let rows = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, account_number, balance, is_deleted FROM accounts
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(ids)
        .fetch_all(self.conn()?)
        .await?;
        Ok(rows)
    }

    async fn update_account_balance(
        &mut self,
        account_id: i64,
        balance: &BigDecimal,
    ) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2")
            .bind(balance)
            .bind(account_id)
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("account {}", account_id)));
        }
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> RepositoryResult<Payment> {
        let row = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (user_id, order_line_id, account_id, amount, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, order_line_id, account_id, amount, price, paid_at, is_deleted
            "#,
        )
        .bind(payment.user_id)
        .bind(payment.order_line_id)
        .bind(payment.account_id)
        .bind(payment.amount)
        .bind(&payment.price)
        .fetch_one(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn commit(&mut self) -> RepositoryResult<()> {
        let tx = self.tx.take().ok_or(RepositoryError::Finished)?;
        tx.commit().await?;
        Ok(())
    }
}
