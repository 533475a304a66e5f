//! Minimal interpretation of inbound frames.
//!
//! The hub treats payloads as opaque bytes. The only thing the connection
//! layer looks at is whether a JSON object asks to be delivered to a pair
//! group (`"type": "pair"`). Everything else goes to every client, verbatim.

use serde_json::Value;

use crate::hub::PairId;

/// `type` value that requests pair-scoped delivery.
pub const PAIR_MESSAGE_TYPE: &str = "pair";

/// `type` value announcing that a client closed all its positions.
pub const STOP_OUT_MESSAGE_TYPE: &str = "all_positions_closed";

/// Where an inbound payload should be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Every registered client.
    All,
    /// Members of one pair group.
    Pair(PairId),
    /// Nowhere: a pair message with no group to target.
    Drop,
}

/// Decides the delivery route for `payload` sent by a client in `own_pair`.
///
/// A JSON object with `"type": "pair"` goes to the group named by its
/// `"pair"` field, falling back to the sender's own group. Anything else,
/// JSON or not, is broadcast.
#[must_use]
pub fn route(payload: &[u8], own_pair: Option<&PairId>) -> Route {
    let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(payload) else {
        return Route::All;
    };

    let msg_type = fields.get("type").and_then(Value::as_str);
    match msg_type {
        Some(PAIR_MESSAGE_TYPE) => {
            let target = fields
                .get("pair")
                .and_then(Value::as_str)
                .and_then(PairId::parse)
                .or_else(|| own_pair.cloned());
            target.map_or(Route::Drop, Route::Pair)
        }
        Some(STOP_OUT_MESSAGE_TYPE) => {
            tracing::info!(pair = own_pair.map_or("", PairId::as_str), "stop-out message received");
            Route::All
        }
        Some(other) => {
            tracing::debug!(msg_type = other, "message received");
            Route::All
        }
        None => Route::All,
    }
}
