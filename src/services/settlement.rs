//! Payment settlement: moves the order total from a buyer account to the
//! seller's account, marks the order paid and records the payment, all in
//! one unit of work.
//!
//! The order row is locked first, so two payments of the same order are
//! serialized and the second one sees `is_paid`. Both accounts are then
//! locked together in ascending id order and the buyer balance is checked
//! again under the lock.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use tracing::instrument;

use crate::context::RequestContext;
use crate::domain::{Account, NewPayment, OrderStatusKind, Payment, PaymentView, Product};
use crate::ports::{Store, UnitOfWork};
use crate::services::error::{LedgerError, LedgerResult};
use crate::services::order_ledger::load_open_order;

#[derive(Clone)]
pub struct PaymentSettlement {
    store: Arc<dyn Store>,
}

impl PaymentSettlement {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Settles `order_id` for the caller. `account_number` selects the
    /// funding account when the caller owns it; otherwise the first of the
    /// caller's accounts able to cover the total is used.
    #[instrument(skip_all, fields(request_id = %ctx.request_id, user_id = ctx.user_id, order_id = order_id))]
    pub async fn pay(
        &self,
        ctx: &RequestContext,
        order_id: i64,
        account_number: Option<&str>,
    ) -> LedgerResult<Payment> {
        let mut uow = self.store.begin().await?;

        let (order, line) = load_open_order(uow.as_mut(), ctx.user_id, order_id).await?;
        if order.is_paid {
            tracing::warn!("Order has already been paid");
            return Err(LedgerError::AlreadyPaid(order_id));
        }
        let total = line.price.clone();

        let accounts = uow.accounts_for_user(ctx.user_id).await?;
        let funding_id = select_funding_account(&accounts, account_number, &total)?.id;

        let product = uow
            .find_product(line.product_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("product {}", line.product_id)))?;
        let seller_id = resolve_seller_account(uow.as_mut(), &product).await?.id;

        let locked = uow.lock_accounts(&[funding_id, seller_id]).await?;
        let (funding, seller) =
            check_locked_accounts(&locked, funding_id, seller_id, product.id, &total)?;

        if funding_id != seller_id {
            let debited = &funding.balance - &total;
            let credited = &seller.balance + &total;
            uow.update_account_balance(funding_id, &debited).await?;
            uow.update_account_balance(seller_id, &credited).await?;
        }

        let paid_status = uow.status_id(OrderStatusKind::Paid).await?;
        uow.mark_order_paid(order.id, paid_status).await?;

        let payment = uow
            .insert_payment(&NewPayment {
                user_id: ctx.user_id,
                order_line_id: line.id,
                account_id: funding_id,
                amount: line.quantity,
                price: total,
            })
            .await?;

        uow.commit().await?;

        tracing::info!(
            payment_id = payment.id,
            debited_account = funding_id,
            credited_account = seller_id,
            price = %payment.price,
            "Payment settled"
        );
        Ok(payment)
    }

    #[instrument(skip_all, fields(request_id = %ctx.request_id, user_id = ctx.user_id))]
    pub async fn list_payments(&self, ctx: &RequestContext) -> LedgerResult<Vec<PaymentView>> {
        Ok(self.store.payments_for_user(ctx.user_id).await?)
    }

    /// Hides a payment from listings. The record itself is kept.
    #[instrument(skip_all, fields(request_id = %ctx.request_id, user_id = ctx.user_id, payment_id = payment_id))]
    pub async fn delete_payment(&self, ctx: &RequestContext, payment_id: i64) -> LedgerResult<()> {
        if !self.store.hide_payment(payment_id, ctx.user_id).await? {
            tracing::warn!("Payment not found or already removed");
            return Err(LedgerError::NotFound(format!("payment {}", payment_id)));
        }
        tracing::info!("Payment marked as deleted");
        Ok(())
    }
}

/// Chooses the account to debit from the caller's accounts, which are in
/// ascending id order.
pub fn select_funding_account<'a>(
    accounts: &'a [Account],
    account_number: Option<&str>,
    total: &BigDecimal,
) -> LedgerResult<&'a Account> {
    if accounts.is_empty() {
        return Err(LedgerError::NoAccount);
    }

    if let Some(number) = account_number {
        if let Some(account) = accounts.iter().find(|a| a.account_number == number) {
            return Ok(account);
        }
        tracing::warn!("Requested account is not yours, scanning own accounts");
    }

    accounts
        .iter()
        .find(|a| a.covers(total))
        .ok_or_else(|| LedgerError::InsufficientFunds {
            required: total.clone(),
        })
}

/// Re-validates both accounts once their rows are locked: each must still be
/// open, and the funding account must still cover `total`.
fn check_locked_accounts<'a>(
    locked: &'a [Account],
    funding_id: i64,
    seller_id: i64,
    product_id: i64,
    total: &BigDecimal,
) -> LedgerResult<(&'a Account, &'a Account)> {
    let funding = locked
        .iter()
        .find(|a| a.id == funding_id && !a.is_deleted)
        .ok_or_else(|| LedgerError::NotFound(format!("account {}", funding_id)))?;
    let seller = locked
        .iter()
        .find(|a| a.id == seller_id && !a.is_deleted)
        .ok_or(LedgerError::NoSellerAccount(product_id))?;

    if !funding.covers(total) {
        tracing::warn!(account_id = funding_id, required = %total, "Insufficient funds");
        return Err(LedgerError::InsufficientFunds {
            required: total.clone(),
        });
    }

    Ok((funding, seller))
}

/// The product's default account when it is still open, else the seller's
/// first account.
async fn resolve_seller_account(
    uow: &mut dyn UnitOfWork,
    product: &Product,
) -> LedgerResult<Account> {
    if let Some(default_id) = product.default_account_id {
        if let Some(account) = uow.find_account(default_id).await?.filter(|a| !a.is_deleted) {
            return Ok(account);
        }
    }

    uow.accounts_for_user(product.seller_id)
        .await?
        .into_iter()
        .next()
        .ok_or(LedgerError::NoSellerAccount(product.id))
}
