//! Fork node lifecycle endpoints.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use forkbench_registry::networks::validate_rpc_url;
use forkbench_supervisor::{ForkConfig, ProcessState, ProcessStatus, StartRequest};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::api::ApiContext;
use crate::utils::ApiError;

/// Wire form of [`ProcessStatus`]. `pid` and `config` are only reported while
/// the node is running; `state` tells the transient states apart.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub state: ProcessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ForkConfig>,
}

impl From<ProcessStatus> for StatusResponse {
    fn from(status: ProcessStatus) -> Self {
        let running = status.is_running();
        Self {
            running,
            state: status.state,
            pid: status.pid.filter(|_| running),
            config: status.config.filter(|_| running),
        }
    }
}

pub async fn status(State(context): State<ApiContext>) -> Json<StatusResponse> {
    Json(context.supervisor.status().into())
}

pub async fn start(
    State(context): State<ApiContext>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    validate_rpc_url(request.fork_url.trim())?;

    let status = context.supervisor.start(request).await?;
    let port = status.config.as_ref().map(|config| config.port);
    info!(pid = status.pid, port, "anvil started");

    let message = match port {
        Some(port) => format!("anvil started on port {port}"),
        None => "anvil started".to_owned(),
    };
    Ok(Json(json!({
        "message": message,
        "status": StatusResponse::from(status),
    })))
}

pub async fn stop(State(context): State<ApiContext>) -> Result<Json<Value>, ApiError> {
    let stopped = context.supervisor.stop().await?;
    Ok(Json(json!({ "stopped": stopped })))
}

pub async fn logs(State(context): State<ApiContext>) -> Json<Value> {
    Json(json!({ "logs": context.supervisor.logs() }))
}
