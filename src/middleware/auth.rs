use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::AppError;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    InvalidSecret,
    SignatureMismatch,
}

/// Issues a bearer token of the form `<user_id>.<hex hmac-sha256(user_id)>`.
pub fn sign_user_token(secret: &str, user_id: i64) -> Result<String, TokenError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::InvalidSecret)?;
    mac.update(user_id.to_string().as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("{}.{}", user_id, signature))
}

/// Returns the user id carried by `token` when its signature matches.
pub fn verify_user_token(secret: &str, token: &str) -> Result<i64, TokenError> {
    let (user_part, signature_part) = token.split_once('.').ok_or(TokenError::Malformed)?;
    let user_id = user_part.parse::<i64>().map_err(|_| TokenError::Malformed)?;
    let signature = hex::decode(signature_part).map_err(|_| TokenError::Malformed)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::InvalidSecret)?;
    mac.update(user_part.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::SignatureMismatch)?;

    Ok(user_id)
}

/// A bad token is the caller's fault; an unusable secret is ours.
fn token_rejection(err: TokenError) -> AppError {
    match err {
        TokenError::InvalidSecret => {
            AppError::Internal("auth token secret cannot key HMAC-SHA256".to_string())
        }
        TokenError::Malformed | TokenError::SignatureMismatch => {
            tracing::warn!(?err, "Rejected bearer token");
            AppError::Unauthorized("invalid bearer token".to_string())
        }
    }
}

/// Authenticated caller of an engine endpoint. The request id is the one set
/// by the request logger, or a fresh one when the logger is not mounted.
#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let user_id =
            verify_user_token(&state.auth_secret, token.trim()).map_err(token_rejection)?;

        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(RequestContext::new(user_id, request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_signed_token_verifies() {
        let token = sign_user_token(SECRET, 42).unwrap();
        assert!(token.starts_with("42."));
        assert_eq!(verify_user_token(SECRET, &token), Ok(42));
    }

    #[test]
    fn test_token_with_other_secret_is_rejected() {
        let token = sign_user_token("other-secret", 42).unwrap();
        assert_eq!(
            verify_user_token(SECRET, &token),
            Err(TokenError::SignatureMismatch)
        );
    }

    #[test]
    fn test_tampered_user_id_is_rejected() {
        let token = sign_user_token(SECRET, 42).unwrap();
        let forged = token.replacen("42", "43", 1);
        assert_eq!(
            verify_user_token(SECRET, &forged),
            Err(TokenError::SignatureMismatch)
        );
    }

    #[test]
    fn test_token_rejections() {
        assert_eq!(token_rejection(TokenError::Malformed).kind(), "unauthorized");
        assert_eq!(token_rejection(TokenError::SignatureMismatch).kind(), "unauthorized");

        let err = token_rejection(TokenError::InvalidSecret);
        assert_eq!(err.kind(), "internal");
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_malformed_tokens() {
        assert_eq!(verify_user_token(SECRET, "42"), Err(TokenError::Malformed));
        assert_eq!(verify_user_token(SECRET, "abc.00"), Err(TokenError::Malformed));
        assert_eq!(verify_user_token(SECRET, "42.not-hex"), Err(TokenError::Malformed));
    }
}
