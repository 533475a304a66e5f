//! Broadcast endpoint handlers.
//!
//! Lets HTTP producers push a message through the hub without holding a
//! WebSocket. Delivery is the same best-effort fan-out WebSocket producers
//! get: a `202` means the hub accepted the request, not that anyone read it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{BroadcastAccepted, BroadcastRequest};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, ServerError};
use crate::hub::PairId;

/// `POST /broadcast` — Deliver a message to every connected client.
///
/// # Errors
///
/// Returns [`ServerError`] on an empty message or a stopped hub.
#[utoipa::path(
    post,
    path = "/api/v1/broadcast",
    tag = "Broadcast",
    summary = "Broadcast to all clients",
    description = "Queues a message for every connected client. Slow clients are disconnected rather than waited for.",
    request_body = BroadcastRequest,
    responses(
        (status = 202, description = "Broadcast queued", body = BroadcastAccepted),
        (status = 400, description = "Empty message", body = ErrorResponse),
        (status = 503, description = "Hub stopped", body = ErrorResponse),
    )
)]
pub async fn broadcast_all(
    State(state): State<AppState>,
    Json(req): Json<BroadcastRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let message = req.into_message()?;
    ensure_running(&state)?;

    let bytes = message.len();
    state.hub.broadcast(message).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(BroadcastAccepted { pair: None, bytes }),
    ))
}

/// `POST /pairs/{pair}/broadcast` — Deliver a message to one pair group.
///
/// # Errors
///
/// Returns [`ServerError`] on an empty message or pair, or a stopped hub.
#[utoipa::path(
    post,
    path = "/api/v1/pairs/{pair}/broadcast",
    tag = "Broadcast",
    summary = "Broadcast to a pair group",
    description = "Queues a message for the members of one pair group. A group with no members is not an error; the message is simply dropped.",
    params(
        ("pair" = String, Path, description = "Pair identifier"),
    ),
    request_body = BroadcastRequest,
    responses(
        (status = 202, description = "Broadcast queued", body = BroadcastAccepted),
        (status = 400, description = "Empty message or pair", body = ErrorResponse),
        (status = 503, description = "Hub stopped", body = ErrorResponse),
    )
)]
pub async fn broadcast_pair(
    State(state): State<AppState>,
    Path(pair): Path<String>,
    Json(req): Json<BroadcastRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let pair = PairId::parse(&pair)
        .ok_or_else(|| ServerError::InvalidRequest("pair must not be empty".to_string()))?;
    let message = req.into_message()?;
    ensure_running(&state)?;

    let bytes = message.len();
    let label = pair.to_string();
    state.hub.broadcast_to_pair(pair, message).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(BroadcastAccepted {
            pair: Some(label),
            bytes,
        }),
    ))
}

fn ensure_running(state: &AppState) -> Result<(), ServerError> {
    if state.hub.is_running() {
        Ok(())
    } else {
        Err(ServerError::HubUnavailable)
    }
}

/// Broadcast routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/broadcast", post(broadcast_all))
        .route("/pairs/{pair}/broadcast", post(broadcast_pair))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use bytes::Bytes;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ServerConfig;
    use crate::hub::{ClientHandle, Hub};

    fn app(hub: Hub) -> Router {
        crate::api::app(AppState {
            hub,
            config: Arc::new(ServerConfig::default()),
        })
    }

    fn post_json(uri: &str, body: &'static str) -> Request<Body> {
        let Ok(req) = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
        else {
            panic!("request should build");
        };
        req
    }

    async fn status_of(hub: Hub, req: Request<Body>) -> StatusCode {
        let Ok(resp) = app(hub).oneshot(req).await else {
            panic!("router is infallible");
        };
        resp.status()
    }

    #[tokio::test]
    async fn broadcast_reaches_every_client() {
        let (hub, _task) = Hub::spawn(16);
        let (a, mut rx_a) = ClientHandle::new(PairId::parse("x"), 4);
        let (b, mut rx_b) = ClientHandle::new(None, 4);
        hub.register(a).await;
        hub.register(b).await;

        let status = status_of(hub.clone(), post_json("/api/v1/broadcast", r#"{"message":"hi"}"#)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(rx_a.recv().await, Some(Bytes::from_static(b"hi")));
        assert_eq!(rx_b.recv().await, Some(Bytes::from_static(b"hi")));
    }

    #[tokio::test]
    async fn pair_broadcast_skips_other_groups() {
        let (hub, _task) = Hub::spawn(16);
        let (x, mut rx_x) = ClientHandle::new(PairId::parse("x"), 4);
        let (y, mut rx_y) = ClientHandle::new(PairId::parse("y"), 4);
        hub.register(x).await;
        hub.register(y).await;

        let req = post_json("/api/v1/pairs/x/broadcast", r#"{"message":"for-x"}"#);
        assert_eq!(status_of(hub.clone(), req).await, StatusCode::ACCEPTED);
        let _ = hub.snapshot().await;

        assert_eq!(rx_x.try_recv().ok(), Some(Bytes::from_static(b"for-x")));
        assert!(rx_y.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_message_is_bad_request() {
        let (hub, _task) = Hub::spawn(16);
        let req = post_json("/api/v1/broadcast", r#"{"message":""}"#);
        assert_eq!(status_of(hub, req).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stopped_hub_is_unavailable() {
        let (hub, coordinator) = Hub::channel(4);
        drop(coordinator);
        let req = post_json("/api/v1/pairs/x/broadcast", r#"{"message":"m"}"#);
        assert_eq!(status_of(hub, req).await, StatusCode::SERVICE_UNAVAILABLE);
    }
}
