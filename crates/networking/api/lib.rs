//! HTTP/JSON surface of forkbench.
//!
//! Routes are grouped by concern:
//! - `/api/anvil/*`: fork node lifecycle and logs ([`anvil`])
//! - `/api/networks*`: RPC endpoint presets ([`networks`])
//! - `/api/contracts*`: stored contract ABIs ([`contracts`])
//! - `/api/interact`: contract calls and transactions ([`interact`])
//!
//! Every failure is returned as `{"error": message}` with a status code
//! derived from its category, see [`utils::ApiError`].

pub mod anvil;
pub mod api;
pub mod contracts;
pub mod interact;
pub mod networks;
pub mod utils;

pub use api::{ApiContext, router, shutdown_signal, start_api};
pub use utils::ApiError;
