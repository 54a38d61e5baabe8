//! Per-request identity and trace data, passed explicitly into every engine call.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: i64,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(user_id: i64, request_id: impl Into<String>) -> Self {
        Self {
            user_id,
            request_id: request_id.into(),
        }
    }

    /// Context with a fresh request id, for callers outside the HTTP layer.
    pub fn for_user(user_id: i64) -> Self {
        Self::new(user_id, Uuid::new_v4().to_string())
    }
}
