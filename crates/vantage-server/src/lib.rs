//! # vantage-server
//!
//! Axum HTTP + WebSocket server for the Vantage session tracker.
//!
//! The HTTP surface is small: `GET /ws` upgrades to the event protocol,
//! `GET /health` answers liveness probes, and `GET /metrics` renders the
//! Prometheus recorder. All session and admin traffic flows over the
//! WebSocket (see [`protocol`]).
//!
//! ## Crate Position
//!
//! Transport layer only — session semantics live in `vantage-sessions`,
//! which this crate mutates through the injected [`state::AppState`].

#![deny(unsafe_code)]

pub mod metrics;
pub mod protocol;
pub mod state;
pub mod websocket;

use std::net::SocketAddr;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

/// Build the application router.
///
/// CORS is permissive — visitors embed the tracker from arbitrary origins.
/// Restrict at the proxy in production.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket::connection::ws_handler))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "server listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn render_metrics(State(state): State<AppState>) -> String {
    metrics::render(&state.metrics)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
