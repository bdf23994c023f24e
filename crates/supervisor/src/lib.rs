//! Supervision of the local anvil fork node and its captured output.

pub mod config;
pub mod error;
pub mod log_buffer;
pub mod supervisor;

pub use config::{ForkConfig, StartRequest, SupervisorOptions};
pub use error::SupervisorError;
pub use log_buffer::LogBuffer;
pub use supervisor::{ForkSupervisor, ProcessState, ProcessStatus};
