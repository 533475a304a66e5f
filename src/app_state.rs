//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::hub::Hub;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the hub coordinator.
    pub hub: Hub,
    /// Connection limits and timeouts.
    pub config: Arc<ServerConfig>,
}
