//! End-to-end invocation against a scripted JSON-RPC node.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use ethereum_types::H256;
use forkbench_interact::codec::{AbiValue, encode};
use forkbench_interact::signer::keccak;
use forkbench_interact::sol_type::SolType;
use forkbench_interact::{
    EngineConfig, InteractError, InteractionEngine, InvokeOutcome, InvokeRequest,
    TransactionOutcome, TransactionStatus,
};
use serde_json::{Value, json};

const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const HOLDER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
/// First well-known anvil development key.
const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

type Responder = dyn Fn(&str, &Value) -> Value + Send + Sync;

struct MockNode {
    responder: Box<Responder>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockNode {
    fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    fn params_of(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(called, _)| called == method)
            .map(|(_, params)| params.clone())
    }
}

async fn handle(State(node): State<Arc<MockNode>>, Json(body): Json<Value>) -> Json<Value> {
    let method = body["method"].as_str().unwrap_or_default().to_owned();
    let params = body["params"].clone();
    node.calls
        .lock()
        .unwrap()
        .push((method.clone(), params.clone()));
    let mut response = (node.responder)(&method, &params);
    response["jsonrpc"] = json!("2.0");
    response["id"] = body["id"].clone();
    Json(response)
}

async fn spawn_node(
    responder: impl Fn(&str, &Value) -> Value + Send + Sync + 'static,
) -> (String, Arc<MockNode>) {
    let node = Arc::new(MockNode {
        responder: Box::new(responder),
        calls: Mutex::new(Vec::new()),
    });
    let router = Router::new()
        .route("/", post(handle))
        .with_state(node.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}"), node)
}

fn result(value: Value) -> Value {
    json!({ "result": value })
}

fn word(n: u64) -> String {
    format!("{:064x}", n)
}

fn error_string_payload(reason: &str) -> String {
    let body = encode(&[SolType::String], &[AbiValue::String(reason.to_owned())]).unwrap();
    format!("0x08c379a0{}", hex::encode(body))
}

fn token_abi() -> Value {
    json!([
        {
            "type": "function",
            "name": "balanceOf",
            "stateMutability": "view",
            "inputs": [{"name": "owner", "type": "address"}],
            "outputs": [{"name": "", "type": "uint256"}]
        },
        {
            "type": "function",
            "name": "status",
            "stateMutability": "view",
            "inputs": [],
            "outputs": [{"name": "count", "type": "uint256"}, {"name": "paused", "type": "bool"}]
        },
        {
            "type": "function",
            "name": "transfer",
            "stateMutability": "nonpayable",
            "inputs": [{"name": "to", "type": "address"}, {"name": "amount", "type": "uint256"}],
            "outputs": [{"name": "", "type": "bool"}]
        },
        {
            "type": "event",
            "name": "Transfer",
            "inputs": []
        }
    ])
}

fn request(function: &str, args: Vec<Value>, private_key: Option<&str>) -> InvokeRequest {
    InvokeRequest {
        address: CONTRACT.to_owned(),
        abi: token_abi(),
        function: function.to_owned(),
        args,
        private_key: private_key.map(str::to_owned),
        value: None,
    }
}

/// Answers the transaction pipeline; `receipt` decides what the receipt
/// lookup returns and `call` what a replayed `eth_call` returns.
fn transaction_node(receipt: Value, call: Value) -> impl Fn(&str, &Value) -> Value + Send + Sync {
    move |method, params| match method {
        "eth_chainId" => result(json!("0x7a69")),
        "eth_getTransactionCount" => result(json!("0x3")),
        "eth_gasPrice" => result(json!("0x3b9aca00")),
        "eth_estimateGas" => result(json!("0xb411")),
        "eth_sendRawTransaction" => {
            let raw = params[0].as_str().unwrap().trim_start_matches("0x");
            let hash = keccak(&hex::decode(raw).unwrap());
            result(json!(format!("0x{hash:x}")))
        }
        "eth_getTransactionReceipt" => result(receipt.clone()),
        "eth_call" => call.clone(),
        other => panic!("unexpected method {other}"),
    }
}

fn fast_receipts() -> InteractionEngine {
    InteractionEngine::new(EngineConfig {
        receipt_timeout: Duration::from_millis(300),
        receipt_poll_interval: Duration::from_millis(20),
        ..EngineConfig::default()
    })
}

#[tokio::test]
async fn read_call_returns_decoded_value() {
    let (url, node) = spawn_node(|method, _| match method {
        "eth_call" => result(json!(format!("0x{}", word(42)))),
        other => panic!("unexpected method {other}"),
    })
    .await;

    let outcome = InteractionEngine::default()
        .invoke(&request("balanceOf", vec![json!(HOLDER)], None), &url)
        .await
        .unwrap();

    assert_eq!(outcome, InvokeOutcome::Call(json!("42")));
    assert_eq!(node.methods(), vec!["eth_call"]);
    let params = node.params_of("eth_call").unwrap();
    assert_eq!(params[1], json!("latest"));
    assert_eq!(
        params[0]["data"],
        json!("0x70a0823100000000000000000000000070997970c51812dc3a010c7d01b50e0d17dc79c8")
    );
    assert_eq!(
        params[0]["to"],
        json!("0x5fbdb2315678afecb367f032d93f642f64180aa3")
    );
}

#[tokio::test]
async fn read_call_ignores_a_supplied_private_key() {
    let (url, node) = spawn_node(|method, _| match method {
        "eth_call" => result(json!(format!("0x{}", word(5)))),
        other => panic!("unexpected method {other}"),
    })
    .await;

    let outcome = InteractionEngine::default()
        .invoke(
            &request("balanceOf", vec![json!(HOLDER)], Some("0xnotakey")),
            &url,
        )
        .await
        .unwrap();

    assert_eq!(outcome, InvokeOutcome::Call(json!("5")));
    assert_eq!(node.methods(), vec!["eth_call"]);
    assert!(node.params_of("eth_call").unwrap()[0].get("from").is_none());
}

#[tokio::test]
async fn read_call_with_several_outputs_returns_an_array() {
    let (url, _node) = spawn_node(|_, _| result(json!(format!("0x{}{}", word(7), word(1))))).await;

    let outcome = InteractionEngine::default()
        .invoke(&request("status", vec![], None), &url)
        .await
        .unwrap();

    assert_eq!(outcome, InvokeOutcome::Call(json!(["7", true])));
}

#[tokio::test]
async fn read_call_revert_reports_reason() {
    let payload = error_string_payload("Ownable: caller is not the owner");
    let (url, _node) = spawn_node(move |_, _| {
        json!({"error": {"code": 3, "message": "execution reverted", "data": payload}})
    })
    .await;

    let error = InteractionEngine::default()
        .invoke(&request("balanceOf", vec![json!(HOLDER)], None), &url)
        .await
        .unwrap_err();

    match error {
        InteractError::Transaction(message) => {
            assert_eq!(message, "execution reverted: Ownable: caller is not the owner")
        }
        other => panic!("expected a transaction error, got {other:?}"),
    }
}

#[tokio::test]
async fn read_call_against_empty_account_fails() {
    let (url, _node) = spawn_node(|_, _| result(json!("0x"))).await;

    let error = InteractionEngine::default()
        .invoke(&request("balanceOf", vec![json!(HOLDER)], None), &url)
        .await
        .unwrap_err();

    assert!(matches!(error, InteractError::Transaction(_)));
}

#[tokio::test]
async fn transaction_is_signed_sent_and_confirmed() {
    let receipt = json!({"status": "0x1", "blockNumber": "0x5", "gasUsed": "0xb411"});
    let (url, node) = spawn_node(transaction_node(receipt, json!(null))).await;

    let outcome = fast_receipts()
        .invoke(
            &request("transfer", vec![json!(HOLDER), json!("1000")], Some(DEV_KEY)),
            &url,
        )
        .await
        .unwrap();

    let raw = node.params_of("eth_sendRawTransaction").unwrap()[0]
        .as_str()
        .unwrap()
        .trim_start_matches("0x")
        .to_owned();
    let hash: H256 = keccak(&hex::decode(&raw).unwrap());
    assert_eq!(
        outcome,
        InvokeOutcome::Transaction(TransactionOutcome {
            transaction_hash: format!("0x{hash:x}"),
            status: TransactionStatus::Success,
            block_number: Some(5),
            gas_used: Some(0xb411),
        })
    );
    assert_eq!(
        node.methods(),
        vec![
            "eth_chainId",
            "eth_getTransactionCount",
            "eth_gasPrice",
            "eth_estimateGas",
            "eth_sendRawTransaction",
            "eth_getTransactionReceipt",
        ]
    );

    let nonce_params = node.params_of("eth_getTransactionCount").unwrap();
    assert_eq!(
        nonce_params,
        json!(["0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266", "pending"])
    );
    let estimate = node.params_of("eth_estimateGas").unwrap();
    assert_eq!(
        estimate[0]["from"],
        json!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")
    );
    // Chain id 31337 puts v at 62709 or 62710.
    assert!(raw.contains("82f4f5") || raw.contains("82f4f6"));
}

#[tokio::test]
async fn unmined_transaction_is_reported_pending() {
    let (url, node) = spawn_node(transaction_node(json!(null), json!(null))).await;

    let outcome = fast_receipts()
        .invoke(
            &request("transfer", vec![json!(HOLDER), json!("1")], Some(DEV_KEY)),
            &url,
        )
        .await
        .unwrap();

    match outcome {
        InvokeOutcome::Transaction(tx) => {
            assert_eq!(tx.status, TransactionStatus::Pending);
            assert!(tx.transaction_hash.starts_with("0x"));
            assert_eq!(tx.block_number, None);
        }
        other => panic!("expected a transaction outcome, got {other:?}"),
    }
    let polls = node
        .methods()
        .iter()
        .filter(|method| *method == "eth_getTransactionReceipt")
        .count();
    assert!(polls > 1);
}

#[tokio::test]
async fn reverted_transaction_reports_replayed_reason() {
    let receipt = json!({"status": "0x0", "blockNumber": "0x9", "gasUsed": "0x6000"});
    let replay = json!({
        "error": {
            "code": 3,
            "message": "execution reverted",
            "data": error_string_payload("ERC20: transfer amount exceeds balance")
        }
    });
    let (url, node) = spawn_node(transaction_node(receipt, replay)).await;

    let error = fast_receipts()
        .invoke(
            &request("transfer", vec![json!(HOLDER), json!("1")], Some(DEV_KEY)),
            &url,
        )
        .await
        .unwrap_err();

    match error {
        InteractError::Transaction(message) => {
            assert!(message.starts_with("transaction 0x"));
            assert!(
                message.ends_with("reverted: execution reverted: ERC20: transfer amount exceeds balance"),
                "{message}"
            );
        }
        other => panic!("expected a transaction error, got {other:?}"),
    }
    // Replayed at the block the receipt names.
    assert_eq!(node.params_of("eth_call").unwrap()[1], json!("0x9"));
}

#[tokio::test]
async fn node_rejection_before_send_is_a_transaction_error() {
    let (url, _node) = spawn_node(|method, _| match method {
        "eth_chainId" => result(json!("0x7a69")),
        "eth_getTransactionCount" => result(json!("0x0")),
        "eth_gasPrice" => result(json!("0x1")),
        _ => json!({"error": {"code": -32000, "message": "insufficient funds for gas * price + value"}}),
    })
    .await;

    let error = InteractionEngine::default()
        .invoke(
            &request("transfer", vec![json!(HOLDER), json!("1")], Some(DEV_KEY)),
            &url,
        )
        .await
        .unwrap_err();

    match error {
        InteractError::Transaction(message) => {
            assert_eq!(message, "insufficient funds for gas * price + value")
        }
        other => panic!("expected a transaction error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let error = InteractionEngine::default()
        .invoke(
            &request("balanceOf", vec![json!(HOLDER)], None),
            &format!("http://{addr}"),
        )
        .await
        .unwrap_err();

    assert!(matches!(error, InteractError::Network(_)), "{error:?}");
}

#[tokio::test]
async fn invalid_requests_never_reach_the_node() {
    let (url, node) = spawn_node(|method, _| panic!("unexpected method {method}")).await;
    let engine = InteractionEngine::default();

    let wrong_arity = request("balanceOf", vec![], None);
    let missing_key = request("transfer", vec![json!(HOLDER), json!("1")], None);
    let bad_argument = request("transfer", vec![json!(HOLDER), json!("-1")], Some(DEV_KEY));
    let bad_address = InvokeRequest {
        address: "0x1234".to_owned(),
        ..request("balanceOf", vec![json!(HOLDER)], None)
    };
    let value_on_nonpayable = InvokeRequest {
        value: Some(json!("1")),
        ..request("transfer", vec![json!(HOLDER), json!("1")], Some(DEV_KEY))
    };
    let bad_key = request("transfer", vec![json!(HOLDER), json!("1")], Some("0xnotakey"));

    for invalid in [
        wrong_arity,
        missing_key,
        bad_argument,
        bad_address,
        value_on_nonpayable,
        bad_key,
    ] {
        let error = engine.invoke(&invalid, &url).await.unwrap_err();
        assert!(
            matches!(error, InteractError::Validation(_)),
            "{}: {error:?}",
            invalid.function
        );
    }

    let missing = engine
        .invoke(&request("mint", vec![], None), &url)
        .await
        .unwrap_err();
    assert!(matches!(missing, InteractError::NotFound(_)));

    assert!(node.methods().is_empty());
}

#[tokio::test]
async fn abi_as_json_text_and_full_signature_are_accepted() {
    let (url, node) = spawn_node(|_, _| result(json!(format!("0x{}", word(0))))).await;

    let request = InvokeRequest {
        abi: Value::String(token_abi().to_string()),
        ..request("balanceOf(address)", vec![json!(HOLDER)], None)
    };
    let outcome = InteractionEngine::default()
        .invoke(&request, &url)
        .await
        .unwrap();

    assert_eq!(outcome, InvokeOutcome::Call(json!("0")));
    assert_eq!(node.methods(), vec!["eth_call"]);
}
