use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::LedgerError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Ledger(err) => err.kind(),
            AppError::Validation(_) => "validation",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Internal(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Ledger(err) => match err {
                LedgerError::NotFound(_)
                | LedgerError::NoAccount
                | LedgerError::NoSellerAccount(_)
                | LedgerError::NoAddress
                | LedgerError::AddressRequired(_) => StatusCode::NOT_FOUND,
                LedgerError::InsufficientStock { .. } | LedgerError::AlreadyPaid(_) => {
                    StatusCode::CONFLICT
                }
                LedgerError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
                LedgerError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
                LedgerError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Ledger(err) => err.public_message(),
            AppError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.kind(),
            "message": self.message(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
