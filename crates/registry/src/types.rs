use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named RPC endpoint preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPreset {
    pub id: u64,
    pub name: String,
    pub rpc_url: String,
    pub is_default: bool,
}

/// Mutable fields of a [`NetworkPreset`], used for both creation and full updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFields {
    pub name: String,
    pub rpc_url: String,
    #[serde(default)]
    pub is_default: bool,
}

/// A stored contract: address plus its parsed ABI document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: u64,
    pub name: String,
    pub address: String,
    pub abi: Value,
}

/// Listing view of a contract, without the ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSummary {
    pub id: u64,
    pub name: String,
    pub address: String,
}

impl From<&ContractRecord> for ContractSummary {
    fn from(record: &ContractRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            address: record.address.clone(),
        }
    }
}

/// A validated contract ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContract {
    pub name: String,
    pub address: String,
    pub abi: Value,
}
