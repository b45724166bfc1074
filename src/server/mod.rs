//! HTTP server for Sahayak
//!
//! Builds the axum router over the chat, cancellation, saved-chat, and auth
//! endpoints and runs it with CORS, request tracing, and graceful shutdown.

pub mod handlers;
pub mod state;

pub use state::AppState;

use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::Result;

/// Builds the application router.
///
/// Kept separate from [`run_server`] so tests can drive the router directly
/// with `tower::ServiceExt::oneshot`.
pub fn router(state: AppState) -> Router {
    // Multipart bodies carry up to max_files_per_request files of up to
    // max_file_size_mb each, plus form fields.
    let body_limit = state.config.max_file_size_bytes() as usize
        * state.config.storage.max_files_per_request
        + 1024 * 1024;

    Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/chat/cancel", post(handlers::cancel_chat))
        .route("/api/chat/save", post(handlers::save_chat))
        .route("/api/chat/load/:filename", get(handlers::load_chat))
        .route("/api/chat/saved", get(handlers::list_saved_chats))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/verify", get(handlers::verify))
        .route("/api/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs the server until the shutdown channel fires.
pub async fn run_server(
    state: AppState,
    addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let app = router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            tracing::info!("Server shutdown signal received");
        })
        .await?;

    Ok(())
}
