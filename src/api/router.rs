//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum
//! server. HTTP routes are nested under `/api/` and protected by the
//! bearer-token middleware; the WebSocket upgrade authenticates via
//! one-time ticket instead.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::api::websocket;
use crate::rooms::RoomCoordinator;

/// Build the API router for a coordinator.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost
/// layer); endpoint handlers use `State<ApiContext>`.
pub fn api_router(coordinator: RoomCoordinator) -> Router {
    build_router(ApiContext::new(coordinator))
}

/// Build router from a pre-constructed `ApiContext`.
///
/// Used by callers that need the shared context too — the embedding
/// platform to issue sessions, tests to issue WS tickets directly.
pub fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // Protected routes — bearer auth required.
    //
    // Layers run outermost → innermost: Extension → Auth → Handler.
    // Extension must be outermost so the auth middleware can extract
    // ApiContext.
    let protected = Router::new()
        .route("/rooms", post(endpoints::create_room))
        .route("/rooms/join", post(endpoints::join_room))
        .route("/rooms/:id/end", post(endpoints::end_room))
        .route("/rooms/:id/transcript", get(endpoints::transcript))
        .route("/auth/ws-ticket", post(endpoints::ws_ticket))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx.clone()));

    // WebSocket upgrade route (one-time ticket auth, no bearer header)
    let ws_routes = Router::new()
        .route("/ws/connect", get(websocket::ws_upgrade))
        .with_state(ctx);

    Router::new()
        .nest("/api", protected)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
