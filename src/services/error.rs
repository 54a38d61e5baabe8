use bigdecimal::BigDecimal;
use thiserror::Error;

use crate::ports::RepositoryError;

/// Failures of the ordering and settlement engine.
///
/// Every variant except `Storage` is raised before any write is made, or
/// inside a unit of work that is then dropped, so callers never observe
/// partial effects.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        requested: i32,
        available: i32,
    },

    #[error("insufficient funds: {required} required")]
    InsufficientFunds { required: BigDecimal },

    #[error("no account available to pay with, create an account first")]
    NoAccount,

    #[error("seller of product {0} has no account to receive the payment")]
    NoSellerAccount(i64),

    #[error("address {0} is not yours, please choose one of your addresses")]
    AddressRequired(i64),

    #[error("no delivery address on file, create an address first")]
    NoAddress,

    #[error("order {0} has already been paid")]
    AlreadyPaid(i64),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("storage failure: {0}")]
    Storage(#[from] RepositoryError),
}

impl LedgerError {
    /// Stable machine-readable identifier.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "not_found",
            LedgerError::InsufficientStock { .. } => "insufficient_stock",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::NoAccount => "no_account",
            LedgerError::NoSellerAccount(_) => "no_seller_account",
            LedgerError::AddressRequired(_) => "address_required",
            LedgerError::NoAddress => "no_address",
            LedgerError::AlreadyPaid(_) => "already_paid",
            LedgerError::PermissionDenied(_) => "permission_denied",
            LedgerError::InvalidQuantity(_) => "invalid_quantity",
            LedgerError::Storage(_) => "internal",
        }
    }

    /// Message safe to show to the caller. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            LedgerError::Storage(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
