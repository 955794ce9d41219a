//! Status HTTP server for the conversion daemon.
//!
//! Exposes the current statistics snapshot via HTTP for monitoring tools.

use axum::{extract::State, routing::get, Json, Router};
use std::net::SocketAddr;
use thiserror::Error;

use crate::stats::{SharedStats, StatsSnapshot};

/// Errors that can occur when running the status server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

/// Handler for GET /status endpoint
/// Returns the current StatsSnapshot as JSON
async fn get_status(State(stats): State<SharedStats>) -> Json<StatsSnapshot> {
    let snapshot = stats.read().await.clone();
    Json(snapshot)
}

/// Creates the axum Router with the status endpoint
pub fn create_status_router(stats: SharedStats) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .with_state(stats)
}

/// Runs the status HTTP server on 127.0.0.1 at the given port.
///
/// # Returns
/// * `Ok(())` if server shuts down gracefully
/// * `Err(ServerError)` if server fails to start
pub async fn run_status_server(stats: SharedStats, port: u16) -> Result<(), ServerError> {
    let app = create_status_router(stats);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "status server listening");
    axum::serve(listener, app)
        .await
        .map_err(ServerError::BindError)?;

    Ok(())
}
