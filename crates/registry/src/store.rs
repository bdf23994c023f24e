use std::{path::Path, sync::Arc};

use crate::api::StoreEngine;
use crate::error::RegistryError;
use crate::store_db::in_memory::Store as InMemoryStore;
#[cfg(feature = "sql")]
use crate::store_db::sql::SQLStore;
use tracing::info;

/// File name of the SQLite database inside the data directory.
pub const DB_FILE_NAME: &str = "forkbench.sqlite";

#[derive(Debug, Clone)]
pub struct Store {
    engine: Arc<dyn StoreEngine>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            engine: Arc::new(InMemoryStore::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineType {
    InMemory,
    #[cfg(feature = "sql")]
    SQL,
}

impl Store {
    /// Opens a registry store. The path names the SQLite file for [`EngineType::SQL`] and
    /// is ignored for the in-memory engine.
    pub fn new(_path: &Path, engine_type: EngineType) -> Result<Self, RegistryError> {
        info!("Starting registry storage engine ({engine_type:?})");
        let store = match engine_type {
            EngineType::InMemory => Self {
                engine: Arc::new(InMemoryStore::new()),
            },
            #[cfg(feature = "sql")]
            EngineType::SQL => Self {
                engine: Arc::new(SQLStore::new(_path)?),
            },
        };
        info!("Started registry store engine");
        Ok(store)
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn engine(&self) -> &dyn StoreEngine {
        self.engine.as_ref()
    }
}
