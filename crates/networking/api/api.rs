use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use forkbench_interact::InteractionEngine;
use forkbench_registry::{ContractRegistry, NetworkRegistry};
use forkbench_supervisor::ForkSupervisor;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::utils::ApiError;
use crate::{anvil, contracts, interact, networks};

/// Services shared by every handler.
#[derive(Debug, Clone)]
pub struct ApiContext {
    pub supervisor: Arc<ForkSupervisor>,
    pub networks: NetworkRegistry,
    pub contracts: ContractRegistry,
    pub engine: InteractionEngine,
    /// Endpoint used for interactions when no fork is running and no preset
    /// is marked default.
    pub fallback_rpc_url: Option<String>,
}

pub fn router(context: ApiContext) -> Router {
    // All request headers allowed.
    // All methods allowed.
    // All origins allowed.
    // All headers exposed.
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/health", get(health))
        .route("/api/anvil/status", get(anvil::status))
        .route("/api/anvil/start", post(anvil::start))
        .route("/api/anvil/stop", post(anvil::stop))
        .route("/api/anvil/logs", get(anvil::logs))
        .route("/api/networks", get(networks::list).post(networks::create))
        .route(
            "/api/networks/{id}",
            get(networks::get)
                .put(networks::update)
                .delete(networks::delete),
        )
        .route("/api/networks/{id}/activate", post(networks::activate))
        .route(
            "/api/contracts",
            get(contracts::list).post(contracts::create),
        )
        .route(
            "/api/contracts/{id}",
            get(contracts::get).delete(contracts::delete),
        )
        .route("/api/interact", post(interact::invoke))
        .layer(cors)
        .with_state(context)
}

/// Serves the API on `http_addr` until Ctrl+C.
///
/// # Errors
///
/// Returns an error if the listener cannot bind to `http_addr`.
pub async fn start_api(http_addr: SocketAddr, context: ApiContext) -> Result<(), ApiError> {
    let listener = TcpListener::bind(http_addr)
        .await
        .map_err(|error| ApiError::Internal(format!("cannot bind {http_addr}: {error}")))?;
    info!("Starting HTTP server at {http_addr}");

    axum::serve(listener, router(context))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| ApiError::Internal(error.to_string()))?;

    info!("HTTP server stopped");
    Ok(())
}

/// Returns a future that completes when SIGINT (Ctrl+C) is received.
pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to install Ctrl+C handler: {err}");
        std::future::pending::<()>().await;
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
