use std::{fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser as ClapParser;
use forkbench_interact::{EngineConfig, RpcConfig};
use forkbench_supervisor::SupervisorOptions;
use forkbench_supervisor::config::{
    DEFAULT_ANVIL_BIN, DEFAULT_FORK_HOST, DEFAULT_FORK_PORT,
};
use forkbench_supervisor::log_buffer::DEFAULT_LOG_CAPACITY;
use tracing::Level;

#[allow(clippy::upper_case_acronyms)]
#[derive(ClapParser)]
#[command(
    name = "forkbench",
    version,
    about = "Local fork node supervisor and contract workbench"
)]
pub struct CLI {
    #[command(flatten)]
    pub opts: Options,
}

#[derive(ClapParser, Debug, Clone)]
pub struct Options {
    #[arg(
        long = "http.addr",
        default_value = "127.0.0.1",
        value_name = "ADDRESS",
        help = "Listening address for the HTTP API.",
        help_heading = "HTTP options",
        env = "FORKBENCH_HTTP_ADDR"
    )]
    pub http_addr: String,
    #[arg(
        long = "http.port",
        default_value = "5000",
        value_name = "PORT",
        help = "Listening port for the HTTP API.",
        help_heading = "HTTP options",
        env = "FORKBENCH_HTTP_PORT"
    )]
    pub http_port: String,
    #[arg(
        long = "anvil.bin",
        default_value = DEFAULT_ANVIL_BIN,
        value_name = "PATH",
        help = "Fork node executable, looked up in PATH unless absolute.",
        help_heading = "Fork node options",
        env = "FORKBENCH_ANVIL_BIN"
    )]
    pub anvil_bin: PathBuf,
    #[arg(
        long = "anvil.host",
        default_value = DEFAULT_FORK_HOST,
        value_name = "ADDRESS",
        help = "Address the fork node binds its RPC server to.",
        help_heading = "Fork node options",
        env = "FORKBENCH_ANVIL_HOST"
    )]
    pub anvil_host: String,
    #[arg(
        long = "anvil.port",
        default_value_t = DEFAULT_FORK_PORT,
        value_name = "PORT",
        help = "Port used when a start request does not name one.",
        long_help = "Port used when a start request does not name one. 0 lets the OS pick a free port.",
        help_heading = "Fork node options",
        env = "FORKBENCH_ANVIL_PORT"
    )]
    pub anvil_port: u16,
    #[arg(
        long = "anvil.startup-timeout",
        default_value_t = 30,
        value_name = "SECONDS",
        help = "How long to wait for the fork node to accept connections.",
        help_heading = "Fork node options",
        env = "FORKBENCH_ANVIL_STARTUP_TIMEOUT"
    )]
    pub anvil_startup_timeout: u64,
    #[arg(
        long = "anvil.grace-period",
        default_value_t = 5,
        value_name = "SECONDS",
        help = "Time between SIGTERM and SIGKILL when stopping the fork node.",
        help_heading = "Fork node options",
        env = "FORKBENCH_ANVIL_GRACE_PERIOD"
    )]
    pub anvil_grace_period: u64,
    #[arg(
        long = "anvil.log-lines",
        default_value_t = DEFAULT_LOG_CAPACITY,
        value_name = "LINES",
        help = "Number of fork node output lines kept in memory.",
        help_heading = "Fork node options",
        env = "FORKBENCH_ANVIL_LOG_LINES"
    )]
    pub anvil_log_lines: usize,
    #[arg(
        long = "datadir",
        default_value = "forkbench-data",
        value_name = "DATABASE_DIRECTORY",
        help = "Receives the name of the directory where the registry database is located.",
        long_help = "If the datadir is the word `memory`, forkbench will use the in-memory store and nothing is persisted.",
        help_heading = "Storage options",
        env = "FORKBENCH_DATADIR"
    )]
    pub datadir: PathBuf,
    #[arg(
        long = "rpc.fallback-url",
        value_name = "URL",
        help = "Endpoint for contract interactions when no fork is running and no network is active.",
        help_heading = "RPC options",
        env = "FORKBENCH_RPC_FALLBACK_URL"
    )]
    pub rpc_fallback_url: Option<String>,
    #[arg(
        long = "rpc.timeout",
        default_value_t = 30,
        value_name = "SECONDS",
        help = "Timeout of a single JSON-RPC request.",
        help_heading = "RPC options",
        env = "FORKBENCH_RPC_TIMEOUT"
    )]
    pub rpc_timeout: u64,
    #[arg(
        long = "rpc.receipt-timeout",
        default_value_t = 60,
        value_name = "SECONDS",
        help = "How long to wait for a sent transaction to be mined.",
        long_help = "How long to wait for a sent transaction to be mined. Transactions not mined in time are reported as pending.",
        help_heading = "RPC options",
        env = "FORKBENCH_RPC_RECEIPT_TIMEOUT"
    )]
    pub rpc_receipt_timeout: u64,
    #[arg(
        long = "log.level",
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        env = "FORKBENCH_LOG_LEVEL",
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error",
        help_heading = "Logging options"
    )]
    pub log_level: Level,
    #[arg(
        long = "log.color",
        default_value_t = LogColor::Auto,
        help = "Output logs with ANSI color codes.",
        long_help = "Possible values: auto, always, never",
        help_heading = "Logging options",
        env = "FORKBENCH_LOG_COLOR"
    )]
    pub log_color: LogColor,
}

impl Options {
    pub fn supervisor_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            anvil_bin: self.anvil_bin.clone(),
            host: self.anvil_host.clone(),
            default_port: self.anvil_port,
            startup_timeout: Duration::from_secs(self.anvil_startup_timeout),
            grace_period: Duration::from_secs(self.anvil_grace_period),
            log_capacity: self.anvil_log_lines,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            rpc: RpcConfig {
                timeout: Duration::from_secs(self.rpc_timeout),
                ..RpcConfig::default()
            },
            receipt_timeout: Duration::from_secs(self.rpc_receipt_timeout),
            ..EngineConfig::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogColor {
    #[default]
    Auto,
    Always,
    Never,
}

impl Display for LogColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogColor::Auto => write!(f, "auto"),
            LogColor::Always => write!(f, "always"),
            LogColor::Never => write!(f, "never"),
        }
    }
}

impl FromStr for LogColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(LogColor::Auto),
            "always" => Ok(LogColor::Always),
            "never" => Ok(LogColor::Never),
            _ => Err(format!(
                "Invalid log color '{s}'. Expected: auto, always, or never"
            )),
        }
    }
}
