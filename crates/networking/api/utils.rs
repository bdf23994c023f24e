//! Error type shared by all handlers and its HTTP mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use forkbench_interact::InteractError;
use forkbench_registry::RegistryError;
use forkbench_supervisor::SupervisorError;
use serde_json::json;
use tracing::{debug, error};

/// Error returned by an API handler.
///
/// Each variant maps to an HTTP status:
/// - `400`: malformed body, bad ABI, argument mismatch, missing key
/// - `404`: unknown network, contract or ABI function
/// - `409`: the fork node is already running
/// - `422`: the fork node failed to spawn or start, or a call/transaction was
///   rejected by the chain
/// - `424`: the RPC endpoint could not be reached
/// - `500`: storage or other internal failures
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyRunning(String),
    #[error("{0}")]
    Process(String),
    #[error("{0}")]
    Transaction(String),
    #[error("{0}")]
    Network(String),
    #[error("Internal Error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyRunning(_) => StatusCode::CONFLICT,
            ApiError::Process(_) | ApiError::Transaction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Network(_) => StatusCode::FAILED_DEPENDENCY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(%status, "{self}");
        } else {
            debug!(%status, "{self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::Validation(message) => ApiError::Validation(message),
            not_found @ RegistryError::NotFound { .. } => ApiError::NotFound(not_found.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SupervisorError> for ApiError {
    fn from(value: SupervisorError) -> Self {
        match value {
            SupervisorError::AlreadyRunning => ApiError::AlreadyRunning(value.to_string()),
            SupervisorError::InvalidRequest(message) => ApiError::Validation(message),
            SupervisorError::PortUnavailable { .. }
            | SupervisorError::Spawn { .. }
            | SupervisorError::Startup(_) => ApiError::Process(value.to_string()),
            SupervisorError::Task(message) => ApiError::Internal(message),
            SupervisorError::Io(error) => ApiError::Internal(error.to_string()),
        }
    }
}

impl From<InteractError> for ApiError {
    fn from(value: InteractError) -> Self {
        match value {
            InteractError::Validation(message) => ApiError::Validation(message),
            InteractError::NotFound(message) => ApiError::NotFound(message),
            InteractError::Network(error) => ApiError::Network(error.to_string()),
            InteractError::Transaction(message) => ApiError::Transaction(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        ApiError::Validation(format!("Invalid request body: {}", value.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(value: PathRejection) -> Self {
        ApiError::Validation(format!("Invalid path parameter: {}", value.body_text()))
    }
}
