//! Order placement and cart maintenance.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use crate::context::RequestContext;
use crate::domain::{
    Address, NewOrder, NewOrderLine, Order, OrderLine, OrderStatus, OrderStatusKind, OrderView,
};
use crate::ports::{Store, UnitOfWork};
use crate::services::error::{LedgerError, LedgerResult};
use crate::services::inventory;

#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub product_id: i64,
    pub address_id: i64,
    pub quantity: i32,
}

/// An order together with its single line.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub order: Order,
    pub line: OrderLine,
}

#[derive(Clone)]
pub struct OrderLedger {
    store: Arc<dyn Store>,
}

impl OrderLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Reserves stock and creates the order line and order in one unit of work.
    #[instrument(skip_all, fields(request_id = %ctx.request_id, user_id = ctx.user_id))]
    pub async fn place_order(
        &self,
        ctx: &RequestContext,
        request: PlaceOrder,
    ) -> LedgerResult<OrderReceipt> {
        let mut uow = self.store.begin().await?;

        let user = uow
            .find_user(ctx.user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {}", ctx.user_id)))?;
        if user.is_admin {
            return Err(LedgerError::PermissionDenied(
                "admins are not allowed to create orders".to_string(),
            ));
        }

        let address = resolve_address(uow.as_mut(), ctx.user_id, request.address_id).await?;
        let reservation =
            inventory::reserve(uow.as_mut(), request.product_id, request.quantity).await?;

        let line = uow
            .insert_order_line(&NewOrderLine {
                product_id: request.product_id,
                unit_price: reservation.unit_price.clone(),
                quantity: request.quantity,
                price: reservation.total_price.clone(),
                address_id: address.id,
            })
            .await?;
        let status_id = uow.status_id(OrderStatusKind::Placed).await?;
        let order = uow
            .insert_order(&NewOrder {
                user_id: ctx.user_id,
                line_id: line.id,
                status_id,
            })
            .await?;

        uow.commit().await?;

        tracing::info!(
            order_id = order.id,
            product_id = request.product_id,
            quantity = request.quantity,
            remaining_stock = reservation.remaining_stock,
            "Order placed"
        );
        Ok(OrderReceipt { order, line })
    }

    /// Adds `delta` to the quantity of an unpaid order and recomputes the
    /// total from the captured unit price. Stock is not re-checked.
    #[instrument(skip_all, fields(request_id = %ctx.request_id, user_id = ctx.user_id))]
    pub async fn update_quantity(
        &self,
        ctx: &RequestContext,
        order_id: i64,
        delta: i32,
    ) -> LedgerResult<OrderReceipt> {
        let mut uow = self.store.begin().await?;
        let (order, line) = load_open_order(uow.as_mut(), ctx.user_id, order_id).await?;
        if order.is_paid {
            return Err(LedgerError::NotFound(format!("order {}", order_id)));
        }

        let quantity = line
            .quantity
            .checked_add(delta)
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                LedgerError::InvalidQuantity(format!(
                    "quantity {} adjusted by {} must stay positive",
                    line.quantity, delta
                ))
            })?;
        let price = line.total_for(quantity);
        let line = uow.update_order_line(line.id, quantity, &price).await?;

        uow.commit().await?;

        tracing::info!(order_id, quantity, price = %line.price, "Order quantity updated");
        Ok(OrderReceipt { order, line })
    }

    /// Soft-deletes the line of an unpaid order. Reserved stock is not
    /// returned to the product.
    #[instrument(skip_all, fields(request_id = %ctx.request_id, user_id = ctx.user_id))]
    pub async fn cancel(&self, ctx: &RequestContext, order_id: i64) -> LedgerResult<()> {
        let mut uow = self.store.begin().await?;
        let (order, line) = load_open_order(uow.as_mut(), ctx.user_id, order_id).await?;
        if order.is_paid {
            return Err(LedgerError::NotFound(format!("order {}", order_id)));
        }

        uow.cancel_order_line(line.id).await?;
        uow.commit().await?;

        tracing::info!(order_id, line_id = line.id, "Order cancelled");
        Ok(())
    }

    /// Buyers see their cart; admins see orders placed on the products they sell.
    #[instrument(skip_all, fields(request_id = %ctx.request_id, user_id = ctx.user_id))]
    pub async fn list_orders(&self, ctx: &RequestContext) -> LedgerResult<Vec<OrderView>> {
        let user = self
            .store
            .user(ctx.user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {}", ctx.user_id)))?;

        let orders = if user.is_admin {
            self.store.orders_for_seller(user.id).await?
        } else {
            self.store.orders_for_buyer(user.id).await?
        };
        Ok(orders)
    }

    pub async fn statuses(&self) -> LedgerResult<Vec<OrderStatus>> {
        Ok(self.store.order_statuses().await?)
    }
}

/// Locks `order_id` and loads its line. Orders of other users and orders
/// whose line was cancelled are reported as missing.
pub(crate) async fn load_open_order(
    uow: &mut dyn UnitOfWork,
    user_id: i64,
    order_id: i64,
) -> LedgerResult<(Order, OrderLine)> {
    let not_found = || LedgerError::NotFound(format!("order {}", order_id));

    let order = uow
        .lock_order(order_id)
        .await?
        .filter(|o| o.user_id == user_id)
        .ok_or_else(not_found)?;
    let line = uow
        .find_order_line(order.line_id)
        .await?
        .filter(|l| !l.is_deleted)
        .ok_or_else(not_found)?;

    Ok((order, line))
}

/// Picks the delivery address: the requested one when the user owns it,
/// otherwise the user's only address.
async fn resolve_address(
    uow: &mut dyn UnitOfWork,
    user_id: i64,
    address_id: i64,
) -> LedgerResult<Address> {
    if let Some(address) = uow.find_address(address_id, user_id).await? {
        return Ok(address);
    }

    tracing::warn!(address_id, "Requested address is not available, looking for another");
    let mut addresses = uow.addresses_for_user(user_id).await?;
    match addresses.len() {
        0 => Err(LedgerError::NoAddress),
        1 => Ok(addresses.remove(0)),
        _ => Err(LedgerError::AddressRequired(address_id)),
    }
}
