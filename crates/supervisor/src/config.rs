use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::log_buffer::DEFAULT_LOG_CAPACITY;

pub const DEFAULT_ANVIL_BIN: &str = "anvil";
pub const DEFAULT_FORK_HOST: &str = "0.0.0.0";
pub const DEFAULT_FORK_PORT: u16 = 8545;
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Line printed by the node once its RPC server accepts connections.
pub const READINESS_MARKER: &str = "Listening on";

/// Settings of the running fork. Fixed for the lifetime of one child process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkConfig {
    pub fork_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    pub port: u16,
    /// Unix timestamp (seconds) of the spawn.
    pub start_time: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub fork_url: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// `None` uses the configured default port, `Some(0)` lets the OS pick one.
    #[serde(default)]
    pub port: Option<u16>,
}

/// Static supervisor settings, filled from the command line.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub anvil_bin: PathBuf,
    pub host: String,
    pub default_port: u16,
    pub startup_timeout: Duration,
    pub grace_period: Duration,
    pub log_capacity: usize,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            anvil_bin: PathBuf::from(DEFAULT_ANVIL_BIN),
            host: DEFAULT_FORK_HOST.to_owned(),
            default_port: DEFAULT_FORK_PORT,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}
