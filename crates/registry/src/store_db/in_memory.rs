use std::{
    collections::BTreeMap,
    fmt::Debug,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::api::StoreEngine;
use crate::error::RegistryError;
use crate::types::{ContractRecord, NetworkFields, NetworkPreset, NewContract};

#[derive(Default, Clone, Debug)]
pub struct Store(Arc<RwLock<StoreInner>>);

#[derive(Default, Debug)]
struct StoreInner {
    /// Network presets by id
    networks: BTreeMap<u64, NetworkPreset>,
    /// Contract records by id
    contracts: BTreeMap<u64, ContractRecord>,
    /// Last id handed out for a network
    last_network_id: u64,
    /// Last id handed out for a contract
    last_contract_id: u64,
}

impl StoreInner {
    fn clear_default_networks(&mut self) {
        for network in self.networks.values_mut() {
            network.is_default = false;
        }
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreInner>, RegistryError> {
        self.0
            .read()
            .map_err(|_| RegistryError::Custom("Failed to lock the store".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreInner>, RegistryError> {
        self.0
            .write()
            .map_err(|_| RegistryError::Custom("Failed to lock the store".to_string()))
    }
}

impl StoreEngine for Store {
    fn list_networks(&self) -> Result<Vec<NetworkPreset>, RegistryError> {
        Ok(self.read()?.networks.values().cloned().collect())
    }

    fn get_network(&self, id: u64) -> Result<Option<NetworkPreset>, RegistryError> {
        Ok(self.read()?.networks.get(&id).cloned())
    }

    fn insert_network(&self, fields: NetworkFields) -> Result<NetworkPreset, RegistryError> {
        let mut inner = self.write()?;
        if fields.is_default {
            inner.clear_default_networks();
        }
        inner.last_network_id += 1;
        let network = NetworkPreset {
            id: inner.last_network_id,
            name: fields.name,
            rpc_url: fields.rpc_url,
            is_default: fields.is_default,
        };
        inner.networks.insert(network.id, network.clone());
        Ok(network)
    }

    fn update_network(
        &self,
        id: u64,
        fields: NetworkFields,
    ) -> Result<Option<NetworkPreset>, RegistryError> {
        let mut inner = self.write()?;
        if !inner.networks.contains_key(&id) {
            return Ok(None);
        }
        if fields.is_default {
            inner.clear_default_networks();
        }
        let updated = NetworkPreset {
            id,
            name: fields.name,
            rpc_url: fields.rpc_url,
            is_default: fields.is_default,
        };
        inner.networks.insert(id, updated.clone());
        Ok(Some(updated))
    }

    fn delete_network(&self, id: u64) -> Result<bool, RegistryError> {
        Ok(self.write()?.networks.remove(&id).is_some())
    }

    fn set_default_network(&self, id: u64) -> Result<Option<NetworkPreset>, RegistryError> {
        let mut inner = self.write()?;
        if !inner.networks.contains_key(&id) {
            return Ok(None);
        }
        inner.clear_default_networks();
        Ok(inner.networks.get_mut(&id).map(|network| {
            network.is_default = true;
            network.clone()
        }))
    }

    fn list_contracts(&self) -> Result<Vec<ContractRecord>, RegistryError> {
        Ok(self.read()?.contracts.values().cloned().collect())
    }

    fn get_contract(&self, id: u64) -> Result<Option<ContractRecord>, RegistryError> {
        Ok(self.read()?.contracts.get(&id).cloned())
    }

    fn insert_contract(&self, contract: NewContract) -> Result<ContractRecord, RegistryError> {
        let mut inner = self.write()?;
        inner.last_contract_id += 1;
        let record = ContractRecord {
            id: inner.last_contract_id,
            name: contract.name,
            address: contract.address,
            abi: contract.abi,
        };
        inner.contracts.insert(record.id, record.clone());
        Ok(record)
    }

    fn delete_contract(&self, id: u64) -> Result<bool, RegistryError> {
        Ok(self.write()?.contracts.remove(&id).is_some())
    }
}
