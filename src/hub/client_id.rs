//! Type-safe client identifier.
//!
//! [`ClientId`] is a newtype wrapper around [`uuid::Uuid`] (v4). It stands in
//! for the identity of a [`super::ClientHandle`]: two handles are the same
//! client iff their ids are equal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for one connected client.
///
/// Minted once when the handle is created and immutable thereafter. Used as
/// the key of the [`super::Registry`] client map and as the argument of
/// [`super::Hub::unregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(uuid::Uuid);

impl ClientId {
    /// Creates a new random `ClientId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(ClientId::new(), ClientId::new());
    }

    #[test]
    fn display_is_uuid_format() {
        let id = ClientId::new();
        let s = id.to_string();
        assert_eq!(s.len(), 36);
        assert_eq!(s, id.as_uuid().to_string());
    }
}
