//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression,
//! and all endpoint handlers.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use debai_core::config::DebaiConfig;
use debai_core::error::DebaiError;

use crate::handlers;
use crate::state::AppState;

/// Body limit for everything except uploads.
const JSON_BODY_LIMIT: usize = 1024 * 1024;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Localhost origins on the configured port and the one above it.
fn allowed_origins(port: u16) -> Vec<HeaderValue> {
    let dev_port = port.saturating_add(1);
    [port, dev_port]
        .iter()
        .flat_map(|p| {
            [
                format!("http://127.0.0.1:{}", p),
                format!("http://localhost:{}", p),
            ]
        })
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect()
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(state.config.server.port)))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let upload_limit = state.config.server.max_upload_mb * 1024 * 1024 + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/tools", get(handlers::tools))
        .route("/route", post(handlers::route_message))
        .route("/chat/route", post(handlers::route_message))
        .route("/chat", post(handlers::chat))
        .route("/chat/history/{session_id}", delete(handlers::clear_history))
        .route("/memory/stats/{session_id}", get(handlers::memory_stats))
        .route("/memory/history/{session_id}", get(handlers::memory_history))
        .route("/memory/search/{session_id}", get(handlers::memory_search))
        .route(
            "/upload-file",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/list-files/{session_id}", get(handlers::list_files))
        .route("/delete-file", delete(handlers::delete_file))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on the configured host and port until `shutdown`
/// resolves.
pub async fn start_server<F>(
    config: &DebaiConfig,
    state: AppState,
    shutdown: F,
) -> Result<(), DebaiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}
