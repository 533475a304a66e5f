//! REST API layer: route handlers, DTOs, OpenAPI document, router
//! composition.
//!
//! Resource endpoints are mounted under `/api/v1`; system endpoints and the
//! WebSocket upgrade live at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI description of the REST endpoints.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "pairhub", description = "WebSocket fan-out hub with pair-scoped broadcast"),
    paths(
        handlers::system::health_handler,
        handlers::system::stats_handler,
        handlers::broadcast::broadcast_all,
        handlers::broadcast::broadcast_pair,
    ),
    components(schemas(
        dto::BroadcastRequest,
        dto::BroadcastAccepted,
        dto::StatsResponse,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    ))
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the full application: REST, WebSocket, and (with the
/// `swagger-ui` feature) the interactive API docs.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router.with_state(state)
}
