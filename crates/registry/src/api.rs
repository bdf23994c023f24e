// Storage API for the network and contract registries

use std::fmt::Debug;

use crate::error::RegistryError;
use crate::types::{ContractRecord, NetworkFields, NetworkPreset, NewContract};

/// Backend for the registries.
///
/// Every method is a single atomic unit: implementations must never expose a state
/// where more than one network is flagged as default, nor a half-written record.
pub trait StoreEngine: Debug + Send + Sync {
    /// Returns all network presets ordered by id.
    fn list_networks(&self) -> Result<Vec<NetworkPreset>, RegistryError>;

    fn get_network(&self, id: u64) -> Result<Option<NetworkPreset>, RegistryError>;

    /// Inserts a preset, clearing the default flag on every other preset first when
    /// `fields.is_default` is set.
    fn insert_network(&self, fields: NetworkFields) -> Result<NetworkPreset, RegistryError>;

    /// Replaces all fields of an existing preset. Returns `None` if `id` is unknown.
    fn update_network(
        &self,
        id: u64,
        fields: NetworkFields,
    ) -> Result<Option<NetworkPreset>, RegistryError>;

    /// Returns whether a preset was removed.
    fn delete_network(&self, id: u64) -> Result<bool, RegistryError>;

    /// Makes `id` the only default preset. Returns `None` (leaving every flag
    /// untouched) if `id` is unknown.
    fn set_default_network(&self, id: u64) -> Result<Option<NetworkPreset>, RegistryError>;

    /// Returns all contracts ordered by id.
    fn list_contracts(&self) -> Result<Vec<ContractRecord>, RegistryError>;

    fn get_contract(&self, id: u64) -> Result<Option<ContractRecord>, RegistryError>;

    fn insert_contract(&self, contract: NewContract) -> Result<ContractRecord, RegistryError>;

    /// Returns whether a contract was removed.
    fn delete_contract(&self, id: u64) -> Result<bool, RegistryError>;
}
