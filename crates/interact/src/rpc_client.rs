//! Thin async JSON-RPC HTTP client for the node a contract lives on.
//!
//! Every method performs a single attempt; callers decide whether to retry.

use std::time::Duration;

use ethereum_types::{Address, H256, U256};
use serde_json::{Value, json};

use crate::error::RpcError;

/// Configuration for RPC client behavior.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Per-request timeout (default: 30s).
    pub timeout: Duration,
    /// TCP connect timeout (default: 10s).
    pub connect_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl RpcConfig {
    pub fn build_http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }
}

/// Call object shared by `eth_call` and `eth_estimateGas`.
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Vec<u8>,
    pub value: Option<U256>,
}

impl CallRequest {
    fn to_json(&self) -> Value {
        let mut call = json!({
            "to": format!("0x{:x}", self.to),
            "data": format!("0x{}", hex::encode(&self.data)),
        });
        if let Some(from) = self.from {
            call["from"] = json!(format!("0x{from:x}"));
        }
        if let Some(value) = self.value {
            call["value"] = json!(format!("0x{value:x}"));
        }
        call
    }
}

/// Subset of receipt fields returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcReceipt {
    /// `Some(true)` for success; pre-Byzantium receipts have no status.
    pub status: Option<bool>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EthRpcClient {
    http: reqwest::Client,
    url: String,
    config: RpcConfig,
}

impl EthRpcClient {
    /// Reuses an existing connection pool.
    pub fn with_http_client(http: reqwest::Client, url: &str, config: RpcConfig) -> Self {
        Self {
            http,
            url: url.to_string(),
            config,
        }
    }

    pub async fn eth_chain_id(&self) -> Result<u64, RpcError> {
        let result = self.rpc_call("eth_chainId", json!([])).await?;
        parse_u64("eth_chainId", &result)
    }

    pub async fn eth_gas_price(&self) -> Result<U256, RpcError> {
        let result = self.rpc_call("eth_gasPrice", json!([])).await?;
        parse_u256("eth_gasPrice", &result)
    }

    pub async fn eth_get_transaction_count(
        &self,
        addr: Address,
        block: &str,
    ) -> Result<u64, RpcError> {
        let result = self
            .rpc_call(
                "eth_getTransactionCount",
                json!([format!("0x{addr:x}"), block]),
            )
            .await?;
        parse_u64("eth_getTransactionCount", &result)
    }

    pub async fn eth_call(&self, call: &CallRequest, block: &str) -> Result<Vec<u8>, RpcError> {
        let result = self
            .rpc_call("eth_call", json!([call.to_json(), block]))
            .await?;
        parse_bytes("eth_call", &result)
    }

    pub async fn eth_estimate_gas(&self, call: &CallRequest) -> Result<u64, RpcError> {
        let result = self
            .rpc_call("eth_estimateGas", json!([call.to_json()]))
            .await?;
        parse_u64("eth_estimateGas", &result)
    }

    pub async fn eth_send_raw_transaction(&self, raw: &[u8]) -> Result<H256, RpcError> {
        let result = self
            .rpc_call(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        parse_h256("eth_sendRawTransaction", &result)
    }

    /// `None` while the transaction is not mined yet.
    pub async fn eth_get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<RpcReceipt>, RpcError> {
        let method = "eth_getTransactionReceipt";
        let result = self
            .rpc_call(method, json!([format!("0x{hash:x}")]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let optional_u64 = |field: &str| -> Result<Option<u64>, RpcError> {
            match result.get(field) {
                None | Some(Value::Null) => Ok(None),
                Some(value) => parse_u64(method, value).map(Some),
            }
        };
        Ok(Some(RpcReceipt {
            status: optional_u64("status")?.map(|status| status == 1),
            block_number: optional_u64("blockNumber")?,
            gas_used: optional_u64("gasUsed")?,
        }))
    }

    /// Single attempt at an RPC call.
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout {
                        method: method.into(),
                        elapsed_ms: u64::try_from(self.config.timeout.as_millis())
                            .unwrap_or(u64::MAX),
                    }
                } else {
                    RpcError::ConnectionFailed {
                        url: self.url.clone(),
                        cause: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RpcError::HttpError {
                method: method.into(),
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json_response: Value = response.json().await.map_err(|e| RpcError::ParseError {
            method: method.into(),
            field: "response_body".into(),
            cause: e.to_string(),
        })?;

        if let Some(error) = json_response.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string();
            let data = error
                .get("data")
                .and_then(|d| d.as_str())
                .map(str::to_owned);
            return Err(RpcError::JsonRpcError {
                method: method.into(),
                code,
                message,
                data,
            });
        }

        json_response
            .get("result")
            .cloned()
            .ok_or_else(|| parse_error(method, "result", "missing result field"))
    }
}

// --- Parsing helpers ---

fn parse_error(method: &str, field: &str, cause: impl ToString) -> RpcError {
    RpcError::ParseError {
        method: method.into(),
        field: field.into(),
        cause: cause.to_string(),
    }
}

fn expect_str<'a>(method: &str, field: &str, val: &'a Value) -> Result<&'a str, RpcError> {
    val.as_str()
        .ok_or_else(|| parse_error(method, field, "expected hex string"))
}

fn hex_decode(method: &str, hex_str: &str) -> Result<Vec<u8>, RpcError> {
    let s = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(s).map_err(|e| parse_error(method, "hex", e))
}

fn parse_bytes(method: &str, val: &Value) -> Result<Vec<u8>, RpcError> {
    hex_decode(method, expect_str(method, "bytes", val)?)
}

fn parse_u64(method: &str, val: &Value) -> Result<u64, RpcError> {
    let s = expect_str(method, "u64", val)?;
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).map_err(|e| parse_error(method, "u64", e))
}

fn parse_u256(method: &str, val: &Value) -> Result<U256, RpcError> {
    let s = expect_str(method, "U256", val)?;
    let s = s.strip_prefix("0x").unwrap_or(s);
    U256::from_str_radix(s, 16).map_err(|e| parse_error(method, "U256", e))
}

fn parse_h256(method: &str, val: &Value) -> Result<H256, RpcError> {
    let bytes = parse_bytes(method, val)?;
    if bytes.len() != 32 {
        return Err(parse_error(
            method,
            "H256",
            format!("expected 32 bytes, got {}", bytes.len()),
        ));
    }
    Ok(H256::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_decode_empty() {
        assert_eq!(hex_decode("eth_call", "0x").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_u64_hex() {
        assert_eq!(parse_u64("eth_chainId", &json!("0x7a69")).unwrap(), 31337);
    }

    #[test]
    fn test_parse_u256_hex() {
        assert_eq!(
            parse_u256("eth_gasPrice", &json!("0x4a817c800")).unwrap(),
            U256::from(20_000_000_000u64)
        );
    }

    #[test]
    fn test_parse_h256_wrong_length() {
        assert!(matches!(
            parse_h256("eth_sendRawTransaction", &json!("0x2a")),
            Err(RpcError::ParseError { .. })
        ));
    }

    #[test]
    fn test_call_request_json() {
        let call = CallRequest {
            from: None,
            to: Address::from_low_u64_be(0x42),
            data: vec![0x70, 0xa0, 0x82, 0x31],
            value: Some(U256::from(10)),
        };
        assert_eq!(
            call.to_json(),
            json!({
                "to": "0x0000000000000000000000000000000000000042",
                "data": "0x70a08231",
                "value": "0xa",
            })
        );
    }
}
