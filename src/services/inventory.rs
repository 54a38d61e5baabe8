//! Stock reservation.
//!
//! The product row is locked for the rest of the caller's unit of work, so
//! concurrent reservations on one product are serialized and the sum of
//! committed reservations can never exceed the stock that was available.

use bigdecimal::BigDecimal;

use crate::domain::Product;
use crate::ports::UnitOfWork;
use crate::services::error::{LedgerError, LedgerResult};

/// Outcome of a successful reservation.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub product: Product,
    pub unit_price: BigDecimal,
    pub total_price: BigDecimal,
    pub remaining_stock: i32,
}

/// Checks and decrements the stock of `product_id` inside `uow`.
///
/// A product whose stock drops to exactly zero is soft-deleted in the same
/// unit of work. A product withdrawn while still holding stock is reported as
/// missing. Nothing is written when an error is returned.
pub async fn reserve(
    uow: &mut dyn UnitOfWork,
    product_id: i64,
    quantity: i32,
) -> LedgerResult<Reservation> {
    let product = uow
        .lock_product(product_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("product {}", product_id)))?;

    // A sold-out product is withdrawn with zero stock; report it as a stock
    // shortage rather than a missing product.
    if !product.is_available() && product.stock > 0 {
        return Err(LedgerError::NotFound(format!("product {}", product_id)));
    }

    if quantity <= 0 || quantity > product.stock {
        tracing::warn!(
            product_id,
            requested = quantity,
            available = product.stock,
            "Insufficient stock"
        );
        return Err(LedgerError::InsufficientStock {
            product_id,
            requested: quantity,
            available: product.stock,
        });
    }

    let remaining_stock = product.stock - quantity;
    let sold_out = remaining_stock == 0;
    uow.update_product_stock(product_id, remaining_stock, sold_out)
        .await?;

    if sold_out {
        tracing::info!(product_id, "Product sold out and withdrawn from sale");
    }

    let unit_price = product.price.clone();
    let total_price = &unit_price * BigDecimal::from(quantity);

    Ok(Reservation {
        product,
        unit_price,
        total_price,
        remaining_stock,
    })
}
