pub mod auth;
pub mod request_logger;

pub use auth::{sign_user_token, verify_user_token, TokenError};
pub use request_logger::request_logger_middleware;
