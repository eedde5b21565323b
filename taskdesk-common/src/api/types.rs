//! Shared API response types

use serde::{Deserialize, Serialize};

/// `{ "message": ... }` body used for every status and error response
///
/// # Examples
///
/// ```
/// use taskdesk_common::api::types::MessageResponse;
///
/// let body = MessageResponse::new("Tasks distributed successfully");
/// assert_eq!(body.message, "Tasks distributed successfully");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
