//! Contract interaction: read calls and signed transactions against a
//! JSON-RPC endpoint.
//!
//! ```text
//!   InvokeRequest
//!     -> resolve function in ABI
//!     -> check arity, parse args by declared type
//!     -> encode calldata
//!     -> view/pure:  eth_call -> decode outputs
//!     -> otherwise:  chainId, nonce, gasPrice, estimateGas
//!                    -> sign (EIP-155) -> sendRawTransaction -> poll receipt
//! ```

use std::time::Duration;

use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::abi::{AbiFunction, StateMutability, resolve_function};
use crate::args::{parse_arg, parse_hex, parse_uint_text, render};
use crate::codec::{decode, encode_calldata};
use crate::error::InteractError;
use crate::revert::revert_message;
use crate::rpc_client::{CallRequest, EthRpcClient, RpcConfig, RpcReceipt};
use crate::signer::{LegacyTransaction, Signer};

#[derive(Debug, Clone, Deserialize)]
pub struct InvokeRequest {
    pub address: String,
    /// ABI document, inline or as JSON text.
    pub abi: Value,
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub private_key: Option<String>,
    /// Wei to send along, decimal or `0x` hex.
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    /// Not mined before the receipt timeout.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionOutcome {
    pub transaction_hash: String,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InvokeOutcome {
    /// Decoded return value of a read call.
    Call(Value),
    Transaction(TransactionOutcome),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub rpc: RpcConfig,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            receipt_timeout: Duration::from_secs(60),
            receipt_poll_interval: Duration::from_millis(500),
        }
    }
}

/// Stateless apart from the shared HTTP connection pool; every `invoke` is
/// independent.
#[derive(Debug, Clone)]
pub struct InteractionEngine {
    config: EngineConfig,
    http: reqwest::Client,
}

impl Default for InteractionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl InteractionEngine {
    pub fn new(config: EngineConfig) -> Self {
        let http = config.rpc.build_http_client();
        Self { config, http }
    }

    pub async fn invoke(
        &self,
        request: &InvokeRequest,
        rpc_url: &str,
    ) -> Result<InvokeOutcome, InteractError> {
        let abi = normalize_abi(&request.abi)?;
        let function = resolve_function(&abi, &request.function)?;
        if request.args.len() != function.inputs.len() {
            return Err(InteractError::Validation(format!(
                "function '{}' expects {} arguments, got {}",
                function.name,
                function.inputs.len(),
                request.args.len()
            )));
        }

        let to = parse_contract_address(&request.address)?;
        let input_types = function.input_types()?;
        let values = input_types
            .iter()
            .zip(&function.inputs)
            .zip(&request.args)
            .enumerate()
            .map(|(index, ((ty, param), raw))| {
                let label = if param.name.is_empty() {
                    format!("#{index}")
                } else {
                    param.name.clone()
                };
                parse_arg(ty, raw, &label)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let calldata = encode_calldata(&function, &values)?;
        let value = parse_value(request.value.as_ref())?;
        if value.is_some_and(|value| !value.is_zero())
            && function.state_mutability != StateMutability::Payable
        {
            return Err(InteractError::Validation(format!(
                "function '{}' is not payable, value is not allowed",
                function.name
            )));
        }

        let client =
            EthRpcClient::with_http_client(self.http.clone(), rpc_url, self.config.rpc.clone());
        let call = CallRequest {
            from: None,
            to,
            data: calldata,
            value,
        };

        if function.is_read_only() {
            debug!(function = %function.name, rpc_url, "read call");
            return self.read(&client, &function, call).await.map(InvokeOutcome::Call);
        }

        let private_key = request
            .private_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| InteractError::validation("private key required"))?;
        let signer = Signer::from_hex(private_key)?;
        self.transact(&client, &function, &signer, call)
            .await
            .map(InvokeOutcome::Transaction)
    }

    async fn read(
        &self,
        client: &EthRpcClient,
        function: &AbiFunction,
        call: CallRequest,
    ) -> Result<Value, InteractError> {
        let output_types = function.output_types()?;
        let data = client.eth_call(&call, "latest").await?;
        if output_types.is_empty() {
            return Ok(Value::Null);
        }
        if data.is_empty() {
            return Err(InteractError::Transaction(format!(
                "call returned no data, is there a contract at 0x{:x}?",
                call.to
            )));
        }

        let mut values = decode(&output_types, &data)?;
        if values.len() == 1 {
            return Ok(values.pop().map(|value| render(&value)).unwrap_or_default());
        }
        Ok(Value::Array(values.iter().map(render).collect()))
    }

    async fn transact(
        &self,
        client: &EthRpcClient,
        function: &AbiFunction,
        signer: &Signer,
        mut call: CallRequest,
    ) -> Result<TransactionOutcome, InteractError> {
        let from = signer.address();
        call.from = Some(from);

        let chain_id = client.eth_chain_id().await?;
        let nonce = client.eth_get_transaction_count(from, "pending").await?;
        let gas_price = client.eth_gas_price().await?;
        let gas = client.eth_estimate_gas(&call).await?;

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas,
            to: call.to,
            value: call.value.unwrap_or_default(),
            data: call.data.clone(),
        };
        let signed = tx.sign(signer, chain_id);
        let hash = client.eth_send_raw_transaction(&signed.raw).await?;
        if hash != signed.hash {
            warn!(expected = ?signed.hash, returned = ?hash, "node returned an unexpected transaction hash");
        }
        info!(
            function = %function.name,
            from = ?from,
            nonce,
            gas,
            hash = ?hash,
            "transaction sent"
        );

        let Some(receipt) = self.wait_for_receipt(client, hash).await? else {
            return Ok(TransactionOutcome {
                transaction_hash: format!("0x{hash:x}"),
                status: TransactionStatus::Pending,
                block_number: None,
                gas_used: None,
            });
        };

        if receipt.status == Some(false) {
            let reason = replay_revert_reason(client, &call, receipt.block_number).await;
            warn!(hash = ?hash, %reason, "transaction reverted");
            return Err(InteractError::Transaction(format!(
                "transaction 0x{hash:x} reverted: {reason}"
            )));
        }

        Ok(TransactionOutcome {
            transaction_hash: format!("0x{hash:x}"),
            status: TransactionStatus::Success,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        })
    }

    /// Polls for the receipt until it shows up or the receipt timeout elapses.
    async fn wait_for_receipt(
        &self,
        client: &EthRpcClient,
        hash: H256,
    ) -> Result<Option<RpcReceipt>, InteractError> {
        let deadline = Instant::now() + self.config.receipt_timeout;
        loop {
            if let Some(receipt) = client.eth_get_transaction_receipt(hash).await? {
                return Ok(Some(receipt));
            }
            if Instant::now() >= deadline {
                warn!(hash = ?hash, "receipt not available before timeout");
                return Ok(None);
            }
            sleep(self.config.receipt_poll_interval).await;
        }
    }
}

/// Re-executes a reverted transaction as a call to recover its reason.
async fn replay_revert_reason(
    client: &EthRpcClient,
    call: &CallRequest,
    block_number: Option<u64>,
) -> String {
    let block = block_number
        .map(|number| format!("0x{number:x}"))
        .unwrap_or_else(|| "latest".to_owned());
    match client.eth_call(call, &block).await {
        Err(error) => match InteractError::from(error) {
            InteractError::Transaction(message) => message,
            other => {
                debug!(%other, "revert replay failed");
                revert_message(None)
            }
        },
        // The state at the end of the block no longer reverts.
        Ok(_) => revert_message(None),
    }
}

/// Accepts an inline ABI array or the JSON text of one.
fn normalize_abi(abi: &Value) -> Result<Value, InteractError> {
    match abi {
        Value::String(text) => serde_json::from_str(text)
            .map_err(|error| InteractError::Validation(format!("ABI is not valid JSON: {error}"))),
        other => Ok(other.clone()),
    }
}

fn parse_contract_address(address: &str) -> Result<Address, InteractError> {
    let bytes = parse_hex(address)
        .map_err(|error| InteractError::Validation(format!("invalid contract address: {error}")))?;
    if bytes.len() != 20 {
        return Err(InteractError::validation(
            "invalid contract address: expected 20 bytes",
        ));
    }
    Ok(Address::from_slice(&bytes))
}

fn parse_value(value: Option<&Value>) -> Result<Option<U256>, InteractError> {
    let invalid = |reason: String| InteractError::Validation(format!("invalid value: {reason}"));
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => parse_uint_text(text).map(Some).map_err(invalid),
        Some(Value::Number(number)) => number
            .as_u64()
            .map(|wei| Some(U256::from(wei)))
            .ok_or_else(|| invalid("expected a non-negative integer".to_owned())),
        Some(_) => Err(invalid("expected wei as a string".to_owned())),
    }
}
