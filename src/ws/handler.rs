//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::hub::PairId;

/// Query parameters accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Pair group to join. Empty or absent means no group.
    #[serde(default)]
    pub pair: String,
}

/// `GET /ws?pair=<id>` — Upgrade HTTP connection to WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let pair = PairId::parse(&params.pair);
    let config = Arc::clone(&state.config);
    let hub = state.hub.clone();

    ws.max_message_size(config.max_message_size)
        .on_failed_upgrade(|err| tracing::warn!(error = %err, "ws upgrade failed"))
        .on_upgrade(move |socket| run_connection(socket, hub, pair, config))
}
