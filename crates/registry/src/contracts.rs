//! Named contract records: an address plus its ABI document.

use serde_json::Value;
use tracing::info;

use crate::error::RegistryError;
use crate::store::Store;
use crate::types::{ContractRecord, ContractSummary, NewContract};

/// Descriptor kinds allowed in an ABI document.
const DESCRIPTOR_TYPES: [&str; 6] = [
    "function",
    "constructor",
    "event",
    "error",
    "fallback",
    "receive",
];

#[derive(Debug, Clone)]
pub struct ContractRegistry {
    store: Store,
}

impl ContractRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<ContractSummary>, RegistryError> {
        Ok(self
            .store
            .engine()
            .list_contracts()?
            .iter()
            .map(ContractSummary::from)
            .collect())
    }

    pub fn get(&self, id: u64) -> Result<ContractRecord, RegistryError> {
        self.store
            .engine()
            .get_contract(id)?
            .ok_or(RegistryError::contract_not_found(id))
    }

    /// Stores a contract after checking the address and the structural shape of the ABI.
    ///
    /// Solidity types inside the ABI are not checked here; a malformed type only
    /// surfaces when a call to that function is encoded.
    pub fn create(
        &self,
        name: &str,
        address: &str,
        abi_text: &str,
    ) -> Result<ContractRecord, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::Validation(
                "contract name must not be empty".to_owned(),
            ));
        }
        let address = address.trim();
        if !is_hex_address(address) {
            return Err(RegistryError::Validation(format!(
                "invalid contract address '{address}': expected 0x followed by 40 hex characters"
            )));
        }
        let abi = parse_abi_document(abi_text)?;

        let record = self.store.engine().insert_contract(NewContract {
            name: name.to_owned(),
            address: address.to_owned(),
            abi,
        })?;
        info!(id = record.id, name = %record.name, address = %record.address, "contract stored");
        Ok(record)
    }

    pub fn delete(&self, id: u64) -> Result<(), RegistryError> {
        if !self.store.engine().delete_contract(id)? {
            return Err(RegistryError::contract_not_found(id));
        }
        info!(id, "contract deleted");
        Ok(())
    }
}

/// Parses `abi_text` and checks it is an array of descriptor objects.
pub fn parse_abi_document(abi_text: &str) -> Result<Value, RegistryError> {
    let abi: Value = serde_json::from_str(abi_text)
        .map_err(|error| RegistryError::Validation(format!("ABI is not valid JSON: {error}")))?;
    validate_abi_shape(&abi)?;
    Ok(abi)
}

/// Structural ABI check: a JSON array whose entries are objects with a known
/// (or absent) `type`. Function entries, including untyped ones, must be named.
pub fn validate_abi_shape(abi: &Value) -> Result<(), RegistryError> {
    let entries = abi.as_array().ok_or_else(|| {
        RegistryError::Validation("ABI must be a JSON array of descriptors".to_owned())
    })?;

    for (index, entry) in entries.iter().enumerate() {
        let descriptor = entry.as_object().ok_or_else(|| {
            RegistryError::Validation(format!("ABI entry {index} is not an object"))
        })?;
        let is_function = match descriptor.get("type") {
            None => true,
            Some(Value::String(kind)) if DESCRIPTOR_TYPES.contains(&kind.as_str()) => {
                kind == "function"
            }
            Some(other) => {
                return Err(RegistryError::Validation(format!(
                    "ABI entry {index} has unsupported type {other}"
                )));
            }
        };
        let named = descriptor
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.trim().is_empty());
        if is_function && !named {
            return Err(RegistryError::Validation(format!(
                "ABI function entry {index} has no name"
            )));
        }
    }
    Ok(())
}

fn is_hex_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
