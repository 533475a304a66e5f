//! DTO for the stats endpoint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::hub::RegistrySnapshot;

/// Current hub occupancy.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    /// Number of connected clients.
    pub clients: usize,
    /// Member count per pair group. Empty groups never appear.
    pub pairs: BTreeMap<String, usize>,
}

impl From<RegistrySnapshot> for StatsResponse {
    fn from(snapshot: RegistrySnapshot) -> Self {
        Self {
            clients: snapshot.clients,
            pairs: snapshot.pairs,
        }
    }
}
