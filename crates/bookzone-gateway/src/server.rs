// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use bookzone_chat::ChatService;
use bookzone_core::{AuthAdapter, BookzoneError};

use crate::auth::auth_middleware;
use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The messaging core.
    pub chat: Arc<ChatService>,
    /// Resolves bearer tokens to caller identities.
    pub auth: Arc<dyn AuthAdapter>,
    /// Externally visible base URL used for ws-url discovery.
    pub public_url: Option<String>,
}

/// Build the gateway router.
///
/// - `GET /health` (public)
/// - `GET|POST /v1/conversations`
/// - `GET /v1/conversations/{id}`
/// - `GET|POST /v1/conversations/{id}/messages`
/// - `POST /v1/conversations/{id}/read`
/// - `POST /v1/conversations/{id}/archive`
/// - `GET /v1/conversations/{id}/ws-url`
/// - `GET /ws/chat/{id}` (live channel, token via query parameter)
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/v1/conversations",
            get(handlers::list_conversations).post(handlers::start_conversation),
        )
        .route("/v1/conversations/{id}", get(handlers::get_conversation))
        .route(
            "/v1/conversations/{id}/messages",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route("/v1/conversations/{id}/read", post(handlers::mark_read))
        .route(
            "/v1/conversations/{id}/archive",
            post(handlers::archive_conversation),
        )
        .route("/v1/conversations/{id}/ws-url", get(handlers::get_ws_url))
        .route("/ws/chat/{id}", get(ws::ws_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state.auth),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind `host:port` and serve until `cancel` fires.
pub async fn start_server(
    host: &str,
    port: u16,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), BookzoneError> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| BookzoneError::Transport {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");
    serve(listener, state, cancel).await
}

/// Serve on an already-bound listener until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), BookzoneError> {
    let chat = Arc::clone(&state.chat);
    let app = build_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            // Live sockets are not part of graceful shutdown; close them explicitly.
            let closed = chat.delivery().close_all();
            tracing::info!(closed, "gateway shutting down");
        })
        .await
        .map_err(|e| BookzoneError::Transport {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })
}
