//! Error types for contract interaction.

use crate::revert::revert_message;

#[derive(Debug, thiserror::Error)]
pub enum InteractError {
    /// Malformed request: bad ABI, argument mismatch, missing key.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// The RPC endpoint could not be reached or answered garbage.
    #[error("{0}")]
    Network(RpcError),

    /// The node rejected the call or the transaction reverted.
    #[error("{0}")]
    Transaction(String),
}

impl InteractError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Structured RPC error types for programmatic handling.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Connection to {url} failed: {cause}")]
    ConnectionFailed { url: String, cause: String },

    #[error("{method} timed out after {elapsed_ms}ms")]
    Timeout { method: String, elapsed_ms: u64 },

    #[error("{method} HTTP {status}: {body}")]
    HttpError {
        method: String,
        status: u16,
        body: String,
    },

    #[error("{method} JSON-RPC error {code}: {message}")]
    JsonRpcError {
        method: String,
        code: i64,
        message: String,
        /// Hex revert payload some nodes attach to execution errors.
        data: Option<String>,
    },

    #[error("{method} response parse error in {field}: {cause}")]
    ParseError {
        method: String,
        field: String,
        cause: String,
    },
}

impl From<RpcError> for InteractError {
    /// Transport failures are `Network`; any JSON-RPC error is the node
    /// rejecting the request, decoded as a revert when it carries data.
    fn from(error: RpcError) -> Self {
        match error {
            RpcError::JsonRpcError { message, data, .. } => {
                let payload = data
                    .as_deref()
                    .map(|data| data.strip_prefix("0x").unwrap_or(data))
                    .and_then(|data| hex::decode(data).ok())
                    .filter(|payload| !payload.is_empty());
                match payload {
                    Some(payload) => Self::Transaction(revert_message(Some(&payload))),
                    None => Self::Transaction(message),
                }
            }
            other => Self::Network(other),
        }
    }
}
