use serde::de::DeserializeOwned;
use std::fmt;

use crate::error::AppError;

pub const ACCOUNT_NUMBER_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_id(field: &'static str, id: i64) -> ValidationResult {
    if id <= 0 {
        return Err(ValidationError::new(field, "must be a positive id"));
    }

    Ok(())
}

/// Normalizes an optional account number. Blank values mean "no preference".
pub fn normalize_account_number(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = sanitize_string(raw);
    if value.is_empty() {
        return Ok(None);
    }
    validate_max_len("account_number", &value, ACCOUNT_NUMBER_MAX_LEN)?;

    Ok(Some(value))
}

/// Parses a JSON body that may be left out entirely. An empty or blank body
/// yields `T::default()`; anything else must deserialize into `T`.
pub fn parse_optional_body<T>(body: &[u8]) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body)
        .map_err(|err| ValidationError::new("body", format!("invalid JSON payload: {}", err)))
}
