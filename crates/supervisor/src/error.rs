#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("anvil is already running")]
    AlreadyRunning,
    #[error("Invalid start request: {0}")]
    InvalidRequest(String),
    #[error("Port {port} is unavailable: {cause}")]
    PortUnavailable { port: u16, cause: String },
    #[error("Failed to spawn {bin}: {cause}")]
    Spawn { bin: String, cause: String },
    #[error("anvil failed to start: {0}")]
    Startup(String),
    #[error("Lifecycle task failed: {0}")]
    Task(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
