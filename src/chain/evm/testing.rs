//! In-process JSON-RPC node for adapter tests.
//!
//! Serves a single POST endpoint that dispatches on the JSON-RPC method and
//! params. Responses for blocks, transactions, and receipts are produced by
//! serializing real alloy types so the wire shapes match what a node emits.

use std::sync::Arc;

use alloy_consensus::transaction::Recovered;
use alloy_consensus::{Eip658Value, Receipt, ReceiptEnvelope, ReceiptWithBloom, TxEnvelope};
use alloy_primitives::{Address, B256};
use alloy_rpc_types_eth::{Block, BlockTransactions, Header, Log, Transaction, TransactionReceipt};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use url::Url;

/// What the responder wants sent back for one request.
pub enum Reply {
    /// A `result` value.
    Ok(Value),
    /// A full JSON-RPC `error` object, e.g. with revert `data`.
    Err(Value),
}

type Responder = Arc<dyn Fn(&str, &Value) -> Option<Reply> + Send + Sync>;

/// A mock node bound to an ephemeral localhost port.
pub struct MockNode {
    pub url: Url,
    server: tokio::task::JoinHandle<()>,
}

impl MockNode {
    /// Spawns the node. The responder sees `(method, params)` and returns
    /// `None` for a generic error response.
    pub async fn spawn<F>(responder: F) -> Self
    where
        F: Fn(&str, &Value) -> Option<Reply> + Send + Sync + 'static,
    {
        let responder: Responder = Arc::new(responder);
        let app = Router::new()
            .route("/", post(respond))
            .with_state(responder);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock node");
        let addr = listener.local_addr().expect("mock node addr");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock node serve");
        });
        Self {
            url: format!("http://{addr}/").parse().expect("mock node url"),
            server,
        }
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn respond(State(responder): State<Responder>, Json(body): Json<Value>) -> Json<Value> {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let params = body["params"].clone();
    let id = body["id"].clone();
    match responder(&method, &params) {
        Some(Reply::Ok(result)) => Json(json!({"jsonrpc": "2.0", "id": id, "result": result})),
        Some(Reply::Err(error)) => Json(json!({"jsonrpc": "2.0", "id": id, "error": error})),
        None => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32000, "message": format!("{method} not served")}
        })),
    }
}

/// Serializes a signed envelope as the node would return it inside a block.
pub fn rpc_transaction(
    envelope: TxEnvelope,
    from: Address,
    block_number: u64,
    block_hash: B256,
    index: u64,
) -> Transaction {
    Transaction {
        inner: Recovered::new_unchecked(envelope, from),
        block_hash: Some(block_hash),
        block_number: Some(block_number),
        transaction_index: Some(index),
        effective_gas_price: Some(20_000_000_000),
    }
}

/// A full block carrying the given transactions.
pub fn rpc_block(
    number: u64,
    hash: B256,
    timestamp: u64,
    base_fee: Option<u64>,
    transactions: Vec<Transaction>,
) -> Value {
    let inner = alloy_consensus::Header {
        number,
        timestamp,
        base_fee_per_gas: base_fee,
        gas_limit: 30_000_000,
        ..Default::default()
    };
    let block = Block {
        header: Header {
            hash,
            inner,
            total_difficulty: None,
            size: None,
        },
        uncles: vec![],
        transactions: BlockTransactions::Full(transactions),
        withdrawals: None,
    };
    serde_json::to_value(block).expect("serialize block")
}

/// A minimal legacy receipt for one transaction.
pub fn rpc_receipt(
    transaction_hash: B256,
    block_number: u64,
    block_hash: B256,
    success: bool,
    gas_used: u64,
    from: Address,
    to: Option<Address>,
) -> Value {
    let receipt = TransactionReceipt {
        inner: ReceiptEnvelope::Legacy(ReceiptWithBloom {
            receipt: Receipt {
                status: Eip658Value::Eip658(success),
                cumulative_gas_used: gas_used,
                logs: Vec::<Log>::new(),
            },
            logs_bloom: Default::default(),
        }),
        transaction_hash,
        transaction_index: Some(0),
        block_hash: Some(block_hash),
        block_number: Some(block_number),
        gas_used,
        effective_gas_price: 20_000_000_000,
        blob_gas_used: None,
        blob_gas_price: None,
        from,
        to,
        contract_address: None,
    };
    serde_json::to_value(receipt).expect("serialize receipt")
}
