//! Network and contract registries for forkbench.
//!
//! Both registries sit on top of a [`Store`], which picks between an in-memory
//! engine and a SQLite engine at startup.

pub mod api;
pub mod contracts;
pub mod error;
pub mod networks;
pub mod store;
pub mod store_db;
pub mod types;

pub use contracts::ContractRegistry;
pub use error::RegistryError;
pub use networks::NetworkRegistry;
pub use store::{EngineType, Store};
pub use types::{ContractRecord, ContractSummary, NetworkFields, NetworkPreset};
