#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },
    #[cfg(feature = "sql")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(String),
}

impl RegistryError {
    pub fn network_not_found(id: u64) -> Self {
        RegistryError::NotFound {
            kind: "network",
            id,
        }
    }

    pub fn contract_not_found(id: u64) -> Self {
        RegistryError::NotFound {
            kind: "contract",
            id,
        }
    }
}
