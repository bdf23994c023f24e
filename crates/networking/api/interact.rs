//! Contract interaction endpoint.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use forkbench_interact::InvokeRequest;
use forkbench_registry::networks::validate_http_rpc_url;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::api::ApiContext;
use crate::utils::ApiError;

#[derive(Debug, Deserialize)]
pub struct InteractBody {
    #[serde(flatten)]
    pub request: InvokeRequest,
    /// Explicit endpoint; overrides every other source.
    #[serde(default)]
    pub rpc_url: Option<String>,
}

pub async fn invoke(
    State(context): State<ApiContext>,
    body: Result<Json<InteractBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let rpc_url = resolve_rpc_url(&context, body.rpc_url.as_deref())?;
    debug!(function = %body.request.function, %rpc_url, "invoking contract function");

    let outcome = context.engine.invoke(&body.request, &rpc_url).await?;
    Ok(Json(json!({ "result": outcome })))
}

/// Picks the endpoint for an interaction, in order: the request's own
/// `rpc_url`, the running fork, the default network preset, the configured
/// fallback. The chosen endpoint must be http(s).
pub fn resolve_rpc_url(context: &ApiContext, requested: Option<&str>) -> Result<String, ApiError> {
    let url = pick_rpc_url(context, requested)?;
    validate_http_rpc_url(&url)?;
    Ok(url)
}

fn pick_rpc_url(context: &ApiContext, requested: Option<&str>) -> Result<String, ApiError> {
    if let Some(url) = requested.map(str::trim).filter(|url| !url.is_empty()) {
        return Ok(url.to_owned());
    }
    if let Some(url) = context.supervisor.status().local_rpc_url() {
        return Ok(url);
    }
    if let Some(preset) = context.networks.default_network()? {
        return Ok(preset.rpc_url);
    }
    context
        .fallback_rpc_url
        .clone()
        .ok_or_else(|| {
            ApiError::Network(
                "no RPC endpoint available: start anvil, activate a network or pass rpc_url"
                    .to_owned(),
            )
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use forkbench_interact::InteractionEngine;
    use forkbench_registry::{ContractRegistry, NetworkFields, NetworkRegistry, Store};
    use forkbench_supervisor::{ForkSupervisor, SupervisorOptions};

    use super::*;

    fn context(fallback: Option<&str>) -> ApiContext {
        let store = Store::in_memory();
        ApiContext {
            supervisor: Arc::new(ForkSupervisor::new(SupervisorOptions::default())),
            networks: NetworkRegistry::new(store.clone()),
            contracts: ContractRegistry::new(store),
            engine: InteractionEngine::default(),
            fallback_rpc_url: fallback.map(str::to_owned),
        }
    }

    #[test]
    fn explicit_url_wins() {
        let context = context(Some("http://fallback:8545"));
        assert_eq!(
            resolve_rpc_url(&context, Some(" http://explicit:8545 ")).unwrap(),
            "http://explicit:8545"
        );
    }

    #[test]
    fn default_network_before_fallback() {
        let context = context(Some("http://fallback:8545"));
        assert_eq!(
            resolve_rpc_url(&context, Some("")).unwrap(),
            "http://fallback:8545"
        );

        context
            .networks
            .create(NetworkFields {
                name: "sepolia".into(),
                rpc_url: "https://sepolia.example".into(),
                is_default: true,
            })
            .unwrap();
        assert_eq!(
            resolve_rpc_url(&context, None).unwrap(),
            "https://sepolia.example"
        );
    }

    #[test]
    fn websocket_endpoints_are_rejected() {
        let context = context(Some("http://fallback:8545"));
        context
            .networks
            .create(NetworkFields {
                name: "stream".into(),
                rpc_url: "wss://stream.example".into(),
                is_default: true,
            })
            .unwrap();
        assert!(matches!(
            resolve_rpc_url(&context, None),
            Err(ApiError::Validation(message)) if message.contains("'wss'")
        ));
        assert!(matches!(
            resolve_rpc_url(&context, Some("ws://127.0.0.1:8546")),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            resolve_rpc_url(&context, Some("not a url")),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn nothing_configured_is_a_network_error() {
        assert!(matches!(
            resolve_rpc_url(&context(None), None),
            Err(ApiError::Network(_))
        ));
    }
}
