//! HTTP server implementation using Axum.

use crate::handler::{handle_cloning, handle_health};
use axum::{routing::get, Router};
use clarisa_core::Replicator;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    pub replicator: Arc<Replicator>,
}

/// Build the router with all routes.
pub fn router(replicator: Arc<Replicator>) -> Router {
    let state = Arc::new(AppState { replicator });

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/clarisa/cloning", get(handle_cloning))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    replicator: Arc<Replicator>,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let app = router(replicator);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
