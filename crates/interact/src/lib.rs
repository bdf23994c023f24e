//! Contract interaction for forkbench: ABI handling, argument parsing,
//! transaction signing and the JSON-RPC client that talks to the node.

pub mod abi;
pub mod args;
pub mod codec;
pub mod engine;
pub mod error;
pub mod revert;
pub mod rlp;
pub mod rpc_client;
pub mod signer;
pub mod sol_type;

pub use abi::{AbiFunction, AbiParam, StateMutability, resolve_function};
pub use engine::{
    EngineConfig, InteractionEngine, InvokeOutcome, InvokeRequest, TransactionOutcome,
    TransactionStatus,
};
pub use error::{InteractError, RpcError};
pub use rpc_client::RpcConfig;
