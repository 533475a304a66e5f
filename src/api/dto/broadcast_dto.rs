//! DTOs for the broadcast endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ServerError;

/// Request body for `POST /api/v1/broadcast` and
/// `POST /api/v1/pairs/{pair}/broadcast`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BroadcastRequest {
    /// Text delivered verbatim to every targeted client.
    pub message: String,
}

impl BroadcastRequest {
    /// Returns the message after checking it is not empty.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRequest`] for an empty message.
    pub fn into_message(self) -> Result<String, ServerError> {
        if self.message.is_empty() {
            return Err(ServerError::InvalidRequest(
                "message must not be empty".to_string(),
            ));
        }
        Ok(self.message)
    }
}

/// Acknowledgement returned once the hub has queued a broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BroadcastAccepted {
    /// Target pair group, or `null` for a broadcast to everyone.
    pub pair: Option<String>,
    /// Size of the queued payload in bytes.
    pub bytes: usize,
}
