//! In-process store.
//!
//! A unit of work holds the store-wide lock for its whole lifetime and
//! mutates a private copy of the state, which replaces the shared state on
//! commit. Units of work are therefore fully serialized, and one dropped
//! before commit leaves no trace.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{
    Account, Address, NewOrder, NewOrderLine, NewPayment, Order, OrderLine, OrderStatus,
    OrderStatusKind, OrderView, Payment, PaymentView, Product, UserProfile,
};
use crate::ports::{RepositoryError, RepositoryResult, Store, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    users: BTreeMap<i64, UserProfile>,
    addresses: BTreeMap<i64, Address>,
    products: BTreeMap<i64, Product>,
    accounts: BTreeMap<i64, Account>,
    statuses: BTreeMap<i64, OrderStatus>,
    lines: BTreeMap<i64, OrderLine>,
    orders: BTreeMap<i64, Order>,
    payments: BTreeMap<i64, Payment>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn order_view(&self, order: &Order) -> Option<OrderView> {
        let line = self.lines.get(&order.line_id)?;
        let product = self.products.get(&line.product_id)?;
        let address = self.addresses.get(&line.address_id)?;
        let status = self.statuses.get(&order.status_id)?;
        Some(OrderView {
            order_id: order.id,
            status: status.status_name.clone(),
            is_paid: order.is_paid,
            is_in_cart: order.is_in_cart,
            line_id: line.id,
            product_id: product.id,
            product_title: product.title.clone(),
            unit_price: line.unit_price.clone(),
            quantity: line.quantity,
            price: line.price.clone(),
            address_id: address.id,
            address_name: address.address_name.clone(),
            ordered_at: line.created_at,
        })
    }
}

/// Shared in-memory store. Cloning yields another handle to the same data.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a store with the order status lookup rows already present.
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        for (kind, description) in [
            (OrderStatusKind::Placed, "Order placed, awaiting payment"),
            (OrderStatusKind::InCart, "Order kept in the cart"),
            (OrderStatusKind::Paid, "Order settled"),
        ] {
            let id = state.next_id();
            state.statuses.insert(
                id,
                OrderStatus {
                    id,
                    status_name: kind.as_str().to_string(),
                    description: description.to_string(),
                },
            );
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn add_user(&self, username: &str, is_admin: bool) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.users.insert(
            id,
            UserProfile {
                id,
                username: username.to_string(),
                is_admin,
            },
        );
        id
    }

    pub async fn add_address(&self, user_id: i64, address_name: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.addresses.insert(
            id,
            Address {
                id,
                user_id,
                address_name: address_name.to_string(),
                is_deleted: false,
            },
        );
        id
    }

    pub async fn add_account(&self, user_id: i64, account_number: &str, balance: BigDecimal) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.accounts.insert(
            id,
            Account {
                id,
                user_id,
                account_number: account_number.to_string(),
                balance,
                is_deleted: false,
            },
        );
        id
    }

    pub async fn add_product(
        &self,
        seller_id: i64,
        title: &str,
        price: BigDecimal,
        stock: i32,
        default_account_id: Option<i64>,
    ) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.products.insert(
            id,
            Product {
                id,
                seller_id,
                title: title.to_string(),
                price,
                stock,
                default_account_id,
                is_deleted: false,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Soft-deletes an account.
    pub async fn close_account(&self, account_id: i64) {
        if let Some(account) = self.state.lock().await.accounts.get_mut(&account_id) {
            account.is_deleted = true;
        }
    }

    pub async fn product(&self, product_id: i64) -> Option<Product> {
        self.state.lock().await.products.get(&product_id).cloned()
    }

    pub async fn account(&self, account_id: i64) -> Option<Account> {
        self.state.lock().await.accounts.get(&account_id).cloned()
    }

    pub async fn order(&self, order_id: i64) -> Option<Order> {
        self.state.lock().await.orders.get(&order_id).cloned()
    }

    pub async fn order_line(&self, line_id: i64) -> Option<OrderLine> {
        self.state.lock().await.lines.get(&line_id).cloned()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Every payment record, hidden ones included.
    pub async fn payments(&self) -> Vec<Payment> {
        self.state.lock().await.payments.values().cloned().collect()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> RepositoryResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard: Some(guard),
            working,
        }))
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }

    async fn user(&self, user_id: i64) -> RepositoryResult<Option<UserProfile>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn orders_for_buyer(&self, user_id: i64) -> RepositoryResult<Vec<OrderView>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.user_id == user_id && o.is_in_cart)
            .filter(|o| state.lines.get(&o.line_id).is_some_and(|l| !l.is_deleted))
            .filter_map(|o| state.order_view(o))
            .collect())
    }

    async fn orders_for_seller(&self, seller_id: i64) -> RepositoryResult<Vec<OrderView>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .filter(|o| {
                state
                    .lines
                    .get(&o.line_id)
                    .filter(|l| !l.is_deleted)
                    .and_then(|l| state.products.get(&l.product_id))
                    .is_some_and(|p| p.seller_id == seller_id)
            })
            .filter_map(|o| state.order_view(o))
            .collect())
    }

    async fn order_statuses(&self) -> RepositoryResult<Vec<OrderStatus>> {
        Ok(self.state.lock().await.statuses.values().cloned().collect())
    }

    async fn payments_for_user(&self, user_id: i64) -> RepositoryResult<Vec<PaymentView>> {
        let state = self.state.lock().await;
        let mut views: Vec<PaymentView> = state
            .payments
            .values()
            .filter(|p| p.user_id == user_id && !p.is_deleted)
            .filter_map(|p| {
                let line = state.lines.get(&p.order_line_id)?;
                let product = state.products.get(&line.product_id)?;
                let account = state.accounts.get(&p.account_id)?;
                Some(PaymentView {
                    payment_id: p.id,
                    order_line_id: line.id,
                    product_title: product.title.clone(),
                    account_number: account.account_number.clone(),
                    amount: p.amount,
                    price: p.price.clone(),
                    paid_at: p.paid_at,
                })
            })
            .collect();
        views.sort_by(|a, b| b.paid_at.cmp(&a.paid_at).then(b.payment_id.cmp(&a.payment_id)));
        Ok(views)
    }

    async fn hide_payment(&self, payment_id: i64, user_id: i64) -> RepositoryResult<bool> {
        let mut state = self.state.lock().await;
        match state.payments.get_mut(&payment_id) {
            Some(p) if p.user_id == user_id && !p.is_deleted => {
                p.is_deleted = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

struct MemoryUnitOfWork {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    working: MemoryState,
}

impl MemoryUnitOfWork {
    fn state(&mut self) -> RepositoryResult<&mut MemoryState> {
        if self.guard.is_none() {
            return Err(RepositoryError::Finished);
        }
        Ok(&mut self.working)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_user(&mut self, user_id: i64) -> RepositoryResult<Option<UserProfile>> {
        Ok(self.state()?.users.get(&user_id).cloned())
    }

    async fn find_address(
        &mut self,
        address_id: i64,
        user_id: i64,
    ) -> RepositoryResult<Option<Address>> {
        Ok(self
            .state()?
            .addresses
            .get(&address_id)
            .filter(|a| a.user_id == user_id && !a.is_deleted)
            .cloned())
    }

    async fn addresses_for_user(&mut self, user_id: i64) -> RepositoryResult<Vec<Address>> {
        Ok(self
            .state()?
            .addresses
            .values()
            .filter(|a| a.user_id == user_id && !a.is_deleted)
            .cloned()
            .collect())
    }

    async fn find_product(&mut self, product_id: i64) -> RepositoryResult<Option<Product>> {
        Ok(self.state()?.products.get(&product_id).cloned())
    }

    async fn lock_product(&mut self, product_id: i64) -> RepositoryResult<Option<Product>> {
        self.find_product(product_id).await
    }

    async fn update_product_stock(
        &mut self,
        product_id: i64,
        stock: i32,
        is_deleted: bool,
    ) -> RepositoryResult<()> {
        let product = self
            .state()?
            .products
            .get_mut(&product_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {}", product_id)))?;
        product.stock = stock;
        product.is_deleted = is_deleted;
        Ok(())
    }

    async fn status_id(&mut self, status: OrderStatusKind) -> RepositoryResult<i64> {
        self.state()?
            .statuses
            .values()
            .find(|s| s.status_name == status.as_str())
            .map(|s| s.id)
            .ok_or_else(|| {
                RepositoryError::Integrity(format!("order status '{}' is missing", status.as_str()))
            })
    }

    async fn insert_order_line(&mut self, line: &NewOrderLine) -> RepositoryResult<OrderLine> {
        let state = self.state()?;
        let id = state.next_id();
        let line = OrderLine {
            id,
            product_id: line.product_id,
            unit_price: line.unit_price.clone(),
            quantity: line.quantity,
            price: line.price.clone(),
            address_id: line.address_id,
            is_deleted: false,
            created_at: Utc::now(),
        };
        state.lines.insert(id, line.clone());
        Ok(line)
    }

    async fn insert_order(&mut self, order: &NewOrder) -> RepositoryResult<Order> {
        let state = self.state()?;
        let id = state.next_id();
        let order = Order {
            id,
            user_id: order.user_id,
            line_id: order.line_id,
            status_id: order.status_id,
            is_paid: false,
            is_in_cart: true,
        };
        state.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn lock_order(&mut self, order_id: i64) -> RepositoryResult<Option<Order>> {
        Ok(self.state()?.orders.get(&order_id).cloned())
    }

    async fn find_order_line(&mut self, line_id: i64) -> RepositoryResult<Option<OrderLine>> {
        Ok(self.state()?.lines.get(&line_id).cloned())
    }

    async fn update_order_line(
        &mut self,
        line_id: i64,
        quantity: i32,
        price: &BigDecimal,
    ) -> RepositoryResult<OrderLine> {
        let line = self
            .state()?
            .lines
            .get_mut(&line_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("order line {}", line_id)))?;
        line.quantity = quantity;
        line.price = price.clone();
        Ok(line.clone())
    }

    async fn cancel_order_line(&mut self, line_id: i64) -> RepositoryResult<()> {
        let line = self
            .state()?
            .lines
            .get_mut(&line_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("order line {}", line_id)))?;
        line.is_deleted = true;
        Ok(())
    }

    async fn mark_order_paid(&mut self, order_id: i64, status_id: i64) -> RepositoryResult<Order> {
        let order = self
            .state()?
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("order {}", order_id)))?;
        order.is_paid = true;
        order.is_in_cart = false;
        order.status_id = status_id;
        Ok(order.clone())
    }

    async fn accounts_for_user(&mut self, user_id: i64) -> RepositoryResult<Vec<Account>> {
        Ok(self
            .state()?
            .accounts
            .values()
            .filter(|a| a.user_id == user_id && !a.is_deleted)
            .cloned()
            .collect())
    }

    async fn find_account(&mut self, account_id: i64) -> RepositoryResult<Option<Account>> {
        Ok(self.state()?.accounts.get(&account_id).cloned())
    }

    async fn lock_accounts(&mut self, account_ids: &[i64]) -> RepositoryResult<Vec<Account>> {
        let mut ids = account_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let state = self.state()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.accounts.get(id).cloned())
            .collect())
    }

    async fn update_account_balance(
        &mut self,
        account_id: i64,
        balance: &BigDecimal,
    ) -> RepositoryResult<()> {
        let account = self
            .state()?
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("account {}", account_id)))?;
        account.balance = balance.clone();
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> RepositoryResult<Payment> {
        let state = self.state()?;
        let id = state.next_id();
        let payment = Payment {
            id,
            user_id: payment.user_id,
            order_line_id: payment.order_line_id,
            account_id: payment.account_id,
            amount: payment.amount,
            price: payment.price.clone(),
            paid_at: Utc::now(),
            is_deleted: false,
        };
        state.payments.insert(id, payment.clone());
        Ok(payment)
    }

    async fn commit(&mut self) -> RepositoryResult<()> {
        let mut guard = self.guard.take().ok_or(RepositoryError::Finished)?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_publishes_working_copy() {
        let store = InMemoryStore::new();
        let user = store.add_user("buyer", false).await;
        let account = store.add_account(user, "BUY-1", BigDecimal::from(10)).await;

        let mut uow = store.begin().await.unwrap();
        uow.update_account_balance(account, &BigDecimal::from(25))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        assert_eq!(
            store.account(account).await.unwrap().balance,
            BigDecimal::from(25)
        );
        let err = uow.find_user(user).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Finished));
    }

    #[tokio::test]
    async fn test_lock_accounts_sorts_and_dedups() {
        let store = InMemoryStore::new();
        let user = store.add_user("buyer", false).await;
        let first = store.add_account(user, "A", BigDecimal::from(1)).await;
        let second = store.add_account(user, "B", BigDecimal::from(2)).await;

        let mut uow = store.begin().await.unwrap();
        let locked = uow.lock_accounts(&[second, first, second]).await.unwrap();
        let ids: Vec<i64> = locked.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn test_status_ids_are_seeded() {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let placed = uow.status_id(OrderStatusKind::Placed).await.unwrap();
        let paid = uow.status_id(OrderStatusKind::Paid).await.unwrap();
        assert_ne!(placed, paid);
    }

    #[tokio::test]
    async fn test_hide_unknown_payment() {
        let store = InMemoryStore::new();
        assert!(!store.hide_payment(1, 1).await.unwrap());
    }
}
