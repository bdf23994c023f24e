//! Named RPC endpoint presets with a single "active" default.

use tracing::info;
use url::Url;

use crate::error::RegistryError;
use crate::store::Store;
use crate::types::{NetworkFields, NetworkPreset};

const SUPPORTED_SCHEMES: [&str; 4] = ["http", "https", "ws", "wss"];
const HTTP_SCHEMES: [&str; 2] = ["http", "https"];

#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    store: Store,
}

impl NetworkRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<NetworkPreset>, RegistryError> {
        self.store.engine().list_networks()
    }

    pub fn get(&self, id: u64) -> Result<NetworkPreset, RegistryError> {
        self.store
            .engine()
            .get_network(id)?
            .ok_or(RegistryError::network_not_found(id))
    }

    /// Creates a preset. When `is_default` is set every other preset loses its
    /// default flag in the same atomic step.
    pub fn create(&self, fields: NetworkFields) -> Result<NetworkPreset, RegistryError> {
        let fields = validate_fields(fields)?;
        let network = self.store.engine().insert_network(fields)?;
        info!(id = network.id, name = %network.name, is_default = network.is_default, "network preset created");
        Ok(network)
    }

    pub fn update(&self, id: u64, fields: NetworkFields) -> Result<NetworkPreset, RegistryError> {
        let fields = validate_fields(fields)?;
        let network = self
            .store
            .engine()
            .update_network(id, fields)?
            .ok_or(RegistryError::network_not_found(id))?;
        info!(id, is_default = network.is_default, "network preset updated");
        Ok(network)
    }

    pub fn delete(&self, id: u64) -> Result<(), RegistryError> {
        if !self.store.engine().delete_network(id)? {
            return Err(RegistryError::network_not_found(id));
        }
        info!(id, "network preset deleted");
        Ok(())
    }

    /// Makes `id` the only default preset.
    pub fn activate(&self, id: u64) -> Result<NetworkPreset, RegistryError> {
        let network = self
            .store
            .engine()
            .set_default_network(id)?
            .ok_or(RegistryError::network_not_found(id))?;
        info!(id, name = %network.name, "network preset activated");
        Ok(network)
    }

    pub fn default_network(&self) -> Result<Option<NetworkPreset>, RegistryError> {
        Ok(self.list()?.into_iter().find(|network| network.is_default))
    }
}

fn validate_fields(fields: NetworkFields) -> Result<NetworkFields, RegistryError> {
    let name = fields.name.trim().to_owned();
    if name.is_empty() {
        return Err(RegistryError::Validation(
            "network name must not be empty".to_owned(),
        ));
    }
    let rpc_url = fields.rpc_url.trim().to_owned();
    validate_rpc_url(&rpc_url)?;
    Ok(NetworkFields {
        name,
        rpc_url,
        is_default: fields.is_default,
    })
}

/// Checks that `rpc_url` is an absolute http(s) or ws(s) URL.
pub fn validate_rpc_url(rpc_url: &str) -> Result<(), RegistryError> {
    let url = parse_rpc_url(rpc_url)?;
    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(RegistryError::Validation(format!(
            "unsupported rpc_url scheme '{}'",
            url.scheme()
        )));
    }
    Ok(())
}

/// Checks that `rpc_url` is usable for contract calls, which only go over HTTP.
pub fn validate_http_rpc_url(rpc_url: &str) -> Result<(), RegistryError> {
    let url = parse_rpc_url(rpc_url)?;
    if !HTTP_SCHEMES.contains(&url.scheme()) {
        return Err(RegistryError::Validation(format!(
            "rpc_url scheme '{}' is not supported for contract calls, use http or https",
            url.scheme()
        )));
    }
    Ok(())
}

fn parse_rpc_url(rpc_url: &str) -> Result<Url, RegistryError> {
    Url::parse(rpc_url)
        .map_err(|error| RegistryError::Validation(format!("invalid rpc_url '{rpc_url}': {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(name: &str, rpc_url: &str, is_default: bool) -> NetworkFields {
        NetworkFields {
            name: name.to_owned(),
            rpc_url: rpc_url.to_owned(),
            is_default,
        }
    }

    fn default_count(registry: &NetworkRegistry) -> usize {
        registry
            .list()
            .map(|networks| networks.iter().filter(|n| n.is_default).count())
            .unwrap_or(usize::MAX)
    }

    #[test]
    fn create_trims_and_assigns_ids() {
        let registry = NetworkRegistry::new(Store::in_memory());
        let first = registry
            .create(fields("  Mainnet ", " https://mainnet.example ", false))
            .unwrap();
        let second = registry
            .create(fields("Sepolia", "https://sepolia.example", false))
            .unwrap();

        assert_eq!(first.name, "Mainnet");
        assert_eq!(first.rpc_url, "https://mainnet.example");
        assert!(second.id > first.id);
    }

    #[test]
    fn create_rejects_empty_name_and_bad_urls() {
        let registry = NetworkRegistry::new(Store::in_memory());
        for (name, url) in [
            ("", "https://mainnet.example"),
            ("Mainnet", "not a url"),
            ("Mainnet", "ftp://mainnet.example"),
        ] {
            let result = registry.create(fields(name, url, false));
            assert!(
                matches!(result, Err(RegistryError::Validation(_))),
                "{name}/{url} should be rejected"
            );
        }
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn websocket_presets_are_stored_but_not_callable() {
        let registry = NetworkRegistry::new(Store::in_memory());
        let preset = registry
            .create(fields("Stream", "wss://stream.example", true))
            .unwrap();
        assert!(matches!(
            validate_http_rpc_url(&preset.rpc_url),
            Err(RegistryError::Validation(message)) if message.contains("'wss'")
        ));
        assert!(validate_http_rpc_url("https://mainnet.example").is_ok());
        assert!(validate_http_rpc_url("not a url").is_err());
    }

    #[test]
    fn creating_a_default_flips_the_previous_one() {
        let registry = NetworkRegistry::new(Store::in_memory());
        let previous = registry
            .create(fields("Mainnet", "https://mainnet.example", true))
            .unwrap();
        let fork_source = registry
            .create(fields("Fork Source", "https://fork.example", true))
            .unwrap();

        assert!(fork_source.is_default);
        assert!(!registry.get(previous.id).unwrap().is_default);
        assert_eq!(default_count(&registry), 1);
    }

    #[test]
    fn activate_leaves_exactly_one_default() {
        let registry = NetworkRegistry::new(Store::in_memory());
        let ids: Vec<u64> = (0..5)
            .map(|i| {
                registry
                    .create(fields(&format!("net-{i}"), "http://127.0.0.1:8545", i % 2 == 0))
                    .unwrap()
                    .id
            })
            .collect();

        for id in ids.iter().rev() {
            let activated = registry.activate(*id).unwrap();
            assert!(activated.is_default);
            assert_eq!(default_count(&registry), 1);
            assert_eq!(registry.default_network().unwrap().map(|n| n.id), Some(*id));
        }
    }

    #[test]
    fn activate_unknown_id_keeps_state() {
        let registry = NetworkRegistry::new(Store::in_memory());
        let current = registry
            .create(fields("Mainnet", "https://mainnet.example", true))
            .unwrap();

        let result = registry.activate(current.id + 100);
        assert!(matches!(result, Err(RegistryError::NotFound { .. })));
        assert_eq!(
            registry.default_network().unwrap().map(|n| n.id),
            Some(current.id)
        );
    }

    #[test]
    fn update_and_delete_unknown_ids_fail() {
        let registry = NetworkRegistry::new(Store::in_memory());
        assert!(matches!(
            registry.update(7, fields("x", "http://localhost:8545", false)),
            Err(RegistryError::NotFound { .. })
        ));
        assert!(matches!(
            registry.delete(7),
            Err(RegistryError::NotFound { .. })
        ));
    }
}
