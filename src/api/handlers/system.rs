//! System endpoints: health check, hub stats, and the browser test page.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::StatsResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, ServerError};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /stats` — Connected clients and pair group sizes.
///
/// # Errors
///
/// Returns [`ServerError::HubUnavailable`] if the hub has stopped.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "System",
    summary = "Hub statistics",
    description = "Returns the number of connected clients and the member count of every pair group.",
    responses(
        (status = 200, description = "Current hub occupancy", body = StatsResponse),
        (status = 503, description = "Hub stopped", body = ErrorResponse),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    let snapshot = state
        .hub
        .snapshot()
        .await
        .ok_or(ServerError::HubUnavailable)?;
    Ok((StatusCode::OK, Json(StatsResponse::from(snapshot))))
}

/// `GET /` — Minimal page for poking at the WebSocket endpoint by hand.
pub async fn home_handler(headers: HeaderMap) -> impl IntoResponse {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    Html(HOME_PAGE.replace("{{WS_URL}}", &format!("ws://{host}/ws")))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
}

const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<script>
window.addEventListener("load", function () {
    var output = document.getElementById("output");
    var input = document.getElementById("input");
    var pair = document.getElementById("pair");
    var ws;
    var print = function (message) {
        var d = document.createElement("div");
        d.textContent = message;
        output.appendChild(d);
        output.scroll(0, output.scrollHeight);
    };
    document.getElementById("open").onclick = function () {
        if (ws) {
            return false;
        }
        ws = new WebSocket("{{WS_URL}}?pair=" + encodeURIComponent(pair.value));
        ws.onopen = function () { print("OPEN"); };
        ws.onclose = function () { print("CLOSE"); ws = null; };
        ws.onmessage = function (evt) { print("RESPONSE: " + evt.data); };
        ws.onerror = function (evt) { print("ERROR: " + evt.data); };
        return false;
    };
    document.getElementById("send").onclick = function () {
        if (!ws) {
            return false;
        }
        print("SEND: " + input.value);
        ws.send(input.value);
        return false;
    };
    document.getElementById("close").onclick = function () {
        if (!ws) {
            return false;
        }
        ws.close();
        return false;
    };
});
</script>
</head>
<body>
<table>
<tr><td valign="top" width="50%">
<p>Click "Open" to connect (optionally joining a pair group), "Send" to
send a message and "Close" to disconnect.</p>
<form>
<p>Pair: <input id="pair" type="text" value="">
<button id="open">Open</button>
<button id="close">Close</button>
<p><input id="input" type="text" value='{"type":"pair","data":"hello"}'>
<button id="send">Send</button>
</form>
</td><td valign="top" width="50%">
<div id="output" style="max-height: 70vh;overflow-y: scroll;"></div>
</td></tr></table>
</body>
</html>
"#;
