//! HTTP endpoints of the wallet service.
//!
//! Thin glue: each handler decodes a JSON request, calls into the registry
//! or an adapter, and serializes the result. Mnemonics live for the scope of
//! one request body and are never logged. The core knows nothing about HTTP;
//! everything protocol-shaped stays in this module.

use std::sync::Arc;

use alloy_primitives::{B256, U256};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::chain::evm::parse_evm_address;
use crate::chain::ChainAdapter;
use crate::error::WalletError;
use crate::registry::NetworkRegistry;
use crate::types::{HistoryRequest, SendOptions};
use crate::wallet;

/// Shared state handed to every handler.
pub struct AppState {
    pub registry: NetworkRegistry,
}

impl AppState {
    /// Adapter for an explicit network id, or the current selection.
    async fn resolve(
        &self,
        network: Option<&str>,
    ) -> Result<crate::chain::NetworkAdapter, WalletError> {
        match network {
            Some(id) => self.registry.adapter(id).await,
            None => self.registry.current_adapter().await,
        }
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
        .route("/wallet/mnemonic", post(post_generate_mnemonic))
        .route("/wallet/address", post(post_derive_address))
        .route("/wallet/addresses", post(post_derive_batch))
        .route("/networks", get(get_networks))
        .route("/networks", post(post_add_network))
        .route("/networks/health", get(get_networks_health))
        .route("/networks/current", put(put_switch_network))
        .route("/networks/{id}", delete(delete_network))
        .route("/networks/{id}/gas", get(get_gas_suggestion))
        .route("/networks/{id}/balance/{address}", get(get_balance))
        .route("/networks/{id}/nonces/{address}", get(get_nonces))
        .route("/balances", post(post_cross_chain_balances))
        .route("/tx/send", post(post_send))
        .route("/tx/erc20/transfer", post(post_erc20_transfer))
        .route("/tx/erc20/approve", post(post_erc20_approve))
        .route("/tx/contract", post(post_contract_tx))
        .route("/tx/raw", post(post_raw))
        .route("/tx/history", post(post_history))
        .route("/tx/{hash}/receipt", get(get_receipt))
        .route("/tx/{hash}/revert-reason", get(get_revert_reason))
        .route("/erc20/balance", post(post_erc20_balance))
        .route("/erc20/metadata", post(post_erc20_metadata))
        .route("/erc20/allowance", post(post_erc20_allowance))
        .route("/sign/personal", post(post_personal_sign))
        .route("/sign/typed-data", post(post_sign_typed_data))
}

#[instrument(skip_all)]
async fn get_root() -> impl IntoResponse {
    let pkg_name = env!("CARGO_PKG_NAME");
    (StatusCode::OK, format!("Hello from {pkg_name}!"))
}

#[instrument(skip_all)]
async fn get_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let current = state.registry.current_network().await;
    Json(json!({ "status": "ok", "current_network": current }))
}

fn default_path() -> String {
    wallet::DEFAULT_DERIVATION_PATH.to_string()
}

fn default_strength() -> u32 {
    128
}

#[derive(Deserialize)]
struct GenerateMnemonicRequest {
    #[serde(default = "default_strength")]
    strength: u32,
}

#[instrument(skip_all)]
async fn post_generate_mnemonic(
    Json(body): Json<GenerateMnemonicRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let mnemonic = wallet::generate_mnemonic(body.strength)?;
    Ok(Json(json!({ "mnemonic": mnemonic })))
}

#[derive(Deserialize)]
struct DeriveAddressRequest {
    mnemonic: String,
    #[serde(default = "default_path")]
    path: String,
}

#[instrument(skip_all)]
async fn post_derive_address(
    Json(body): Json<DeriveAddressRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let address = wallet::derive_address(&body.mnemonic, &body.path)?;
    Ok(Json(json!({ "address": address, "path": body.path })))
}

#[derive(Deserialize)]
struct DeriveBatchRequest {
    mnemonic: String,
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    start: u32,
    count: u32,
}

#[instrument(skip_all)]
async fn post_derive_batch(
    Json(body): Json<DeriveBatchRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let addresses =
        wallet::derive_batch(&body.mnemonic, body.prefix.as_deref(), body.start, body.count)?;
    Ok(Json(json!({ "addresses": addresses })))
}

#[instrument(skip_all)]
async fn get_networks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.available_networks().await)
}

#[instrument(skip_all)]
async fn get_networks_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.check_all_networks_health().await)
}

#[derive(Deserialize)]
struct AddNetworkRequest {
    id: String,
    rpc_url: String,
    chain_type: String,
}

#[instrument(skip_all)]
async fn post_add_network(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddNetworkRequest>,
) -> Result<impl IntoResponse, WalletError> {
    state
        .registry
        .add_network(&body.id, &body.rpc_url, &body.chain_type)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": body.id }))))
}

#[derive(Deserialize)]
struct SwitchNetworkRequest {
    id: String,
}

#[instrument(skip_all)]
async fn put_switch_network(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SwitchNetworkRequest>,
) -> Result<impl IntoResponse, WalletError> {
    state.registry.switch_network(&body.id).await?;
    Ok(Json(json!({ "current_network": body.id })))
}

#[instrument(skip_all)]
async fn delete_network(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, WalletError> {
    state.registry.remove_network(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all)]
async fn get_gas_suggestion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.registry.adapter(&id).await?;
    Ok(Json(adapter.gas_suggestion().await?))
}

#[instrument(skip_all)]
async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path((id, address)): Path<(String, String)>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.registry.adapter(&id).await?;
    let balance = adapter.get_balance(&address).await?;
    Ok(Json(json!({ "network": id, "address": address, "balance": balance })))
}

#[instrument(skip_all)]
async fn get_nonces(
    State(state): State<Arc<AppState>>,
    Path((id, address)): Path<(String, String)>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.registry.adapter(&id).await?;
    let evm = adapter.require_evm()?;
    let (pending, latest) = evm.get_nonces(parse_evm_address(&address)?).await?;
    Ok(Json(json!({ "pending": pending, "latest": latest })))
}

#[derive(Deserialize)]
struct CrossChainBalanceRequest {
    address: String,
    networks: Vec<String>,
}

#[instrument(skip_all)]
async fn post_cross_chain_balances(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CrossChainBalanceRequest>,
) -> impl IntoResponse {
    let balances = state
        .registry
        .cross_chain_balance(&body.address, &body.networks)
        .await;
    Json(balances)
}

#[derive(Deserialize)]
struct SendRequest {
    mnemonic: String,
    #[serde(default = "default_path")]
    path: String,
    to: String,
    value: U256,
    #[serde(default)]
    network: Option<String>,
    #[serde(default)]
    options: SendOptions,
}

#[instrument(skip_all)]
async fn post_send(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(body.network.as_deref()).await?;
    let hash = adapter
        .send_transaction(
            &body.mnemonic,
            &body.path,
            &body.to,
            body.value,
            body.options,
            CancellationToken::new(),
        )
        .await?;
    Ok(Json(json!({ "hash": hash, "network": adapter.id() })))
}

#[derive(Deserialize)]
struct Erc20TransferRequest {
    mnemonic: String,
    #[serde(default = "default_path")]
    path: String,
    token: String,
    to: String,
    amount: U256,
    #[serde(default)]
    network: Option<String>,
    #[serde(default)]
    options: SendOptions,
}

#[instrument(skip_all)]
async fn post_erc20_transfer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Erc20TransferRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(body.network.as_deref()).await?;
    let tokens = adapter.token_support().ok_or_else(|| {
        WalletError::NotSupportedOnChain(format!("{} has no token operations", adapter.id()))
    })?;
    let hash = tokens
        .send_token_transaction(
            &body.mnemonic,
            &body.path,
            &body.token,
            &body.to,
            body.amount,
            body.options,
            CancellationToken::new(),
        )
        .await?;
    Ok(Json(json!({ "hash": hash, "network": adapter.id() })))
}

#[derive(Deserialize)]
struct Erc20ApproveRequest {
    mnemonic: String,
    #[serde(default = "default_path")]
    path: String,
    token: String,
    spender: String,
    amount: U256,
    #[serde(default)]
    network: Option<String>,
    #[serde(default)]
    options: SendOptions,
}

#[instrument(skip_all)]
async fn post_erc20_approve(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Erc20ApproveRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(body.network.as_deref()).await?;
    let evm = adapter.require_evm()?;
    let hash = evm
        .approve_erc20(
            &body.mnemonic,
            &body.path,
            parse_evm_address(&body.token)?,
            parse_evm_address(&body.spender)?,
            body.amount,
            &body.options,
            &CancellationToken::new(),
        )
        .await?;
    Ok(Json(json!({ "hash": hash, "network": adapter.id() })))
}

#[derive(Deserialize)]
struct ContractTxRequest {
    mnemonic: String,
    #[serde(default = "default_path")]
    path: String,
    contract: String,
    /// Hex-encoded calldata.
    data: String,
    #[serde(default)]
    value: U256,
    #[serde(default)]
    gas_limit: u64,
    #[serde(default)]
    gas_price: u128,
    #[serde(default)]
    network: Option<String>,
}

#[instrument(skip_all)]
async fn post_contract_tx(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ContractTxRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(body.network.as_deref()).await?;
    let evm = adapter.require_evm()?;
    let data = hex::decode(body.data.trim_start_matches("0x"))
        .map_err(|e| WalletError::AbiDecoding(format!("calldata is not hex: {e}")))?;
    let hash = evm
        .send_contract_tx(
            &body.mnemonic,
            &body.path,
            parse_evm_address(&body.contract)?,
            data.into(),
            body.value,
            body.gas_limit,
            body.gas_price,
            &CancellationToken::new(),
        )
        .await?;
    Ok(Json(json!({ "hash": hash, "network": adapter.id() })))
}

#[derive(Deserialize)]
struct RawTxRequest {
    raw: String,
    #[serde(default)]
    network: Option<String>,
}

#[instrument(skip_all)]
async fn post_raw(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RawTxRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(body.network.as_deref()).await?;
    let evm = adapter.require_evm()?;
    let hash = evm.broadcast_raw(&body.raw).await?;
    Ok(Json(json!({ "hash": hash, "network": adapter.id() })))
}

#[derive(Deserialize)]
struct HistoryBody {
    #[serde(default)]
    network: Option<String>,
    #[serde(flatten)]
    request: HistoryRequest,
}

#[instrument(skip_all)]
async fn post_history(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HistoryBody>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(body.network.as_deref()).await?;
    let evm = adapter.require_evm()?;
    Ok(Json(evm.get_transaction_history(&body.request).await?))
}

#[derive(Deserialize)]
struct NetworkQuery {
    #[serde(default)]
    network: Option<String>,
}

#[instrument(skip_all)]
async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<B256>,
    Query(query): Query<NetworkQuery>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(query.network.as_deref()).await?;
    let evm = adapter.require_evm()?;
    Ok(Json(evm.get_receipt(hash).await?))
}

#[instrument(skip_all)]
async fn get_revert_reason(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<B256>,
    Query(query): Query<NetworkQuery>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(query.network.as_deref()).await?;
    let evm = adapter.require_evm()?;
    let reason = evm.get_revert_reason(hash).await?;
    Ok(Json(json!({ "hash": hash, "reason": reason })))
}

#[derive(Deserialize)]
struct TokenBalanceRequest {
    token: String,
    owner: String,
    #[serde(default)]
    network: Option<String>,
}

#[instrument(skip_all)]
async fn post_erc20_balance(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TokenBalanceRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(body.network.as_deref()).await?;
    let tokens = adapter.token_support().ok_or_else(|| {
        WalletError::NotSupportedOnChain(format!("{} has no token operations", adapter.id()))
    })?;
    let balance = tokens.get_token_balance(&body.token, &body.owner).await?;
    Ok(Json(json!({ "token": body.token, "owner": body.owner, "balance": balance })))
}

#[derive(Deserialize)]
struct TokenMetadataRequest {
    token: String,
    #[serde(default)]
    network: Option<String>,
}

#[instrument(skip_all)]
async fn post_erc20_metadata(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TokenMetadataRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(body.network.as_deref()).await?;
    let evm = adapter.require_evm()?;
    let metadata = evm.get_erc20_metadata(parse_evm_address(&body.token)?).await?;
    Ok(Json(metadata))
}

#[derive(Deserialize)]
struct AllowanceRequest {
    token: String,
    owner: String,
    spender: String,
    #[serde(default)]
    network: Option<String>,
}

#[instrument(skip_all)]
async fn post_erc20_allowance(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AllowanceRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(body.network.as_deref()).await?;
    let evm = adapter.require_evm()?;
    let allowance = evm
        .get_allowance(
            parse_evm_address(&body.token)?,
            parse_evm_address(&body.owner)?,
            parse_evm_address(&body.spender)?,
        )
        .await?;
    Ok(Json(json!({ "allowance": allowance })))
}

#[derive(Deserialize)]
struct PersonalSignRequest {
    mnemonic: String,
    #[serde(default = "default_path")]
    path: String,
    message: String,
}

#[instrument(skip_all)]
async fn post_personal_sign(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PersonalSignRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(None).await?;
    let evm = adapter.require_evm()?;
    let signed = evm.personal_sign(&body.mnemonic, &body.path, body.message.as_bytes())?;
    Ok(Json(signed))
}

#[derive(Deserialize)]
struct TypedDataSignRequest {
    mnemonic: String,
    #[serde(default = "default_path")]
    path: String,
    typed_data: serde_json::Value,
}

#[instrument(skip_all)]
async fn post_sign_typed_data(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TypedDataSignRequest>,
) -> Result<impl IntoResponse, WalletError> {
    let adapter = state.resolve(None).await?;
    let evm = adapter.require_evm()?;
    let signed = evm.sign_typed_data_v4(&body.mnemonic, &body.path, &body.typed_data)?;
    Ok(Json(signed))
}

impl IntoResponse for WalletError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: &'static str,
            message: String,
        }

        let status = match &self {
            WalletError::InvalidMnemonic(_)
            | WalletError::InvalidPath { .. }
            | WalletError::InvalidAddress(_)
            | WalletError::AbiEncoding(_)
            | WalletError::AbiDecoding(_)
            | WalletError::Config(_) => StatusCode::BAD_REQUEST,
            WalletError::NetworkUnknown(_) | WalletError::ReceiptNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            WalletError::NetworkAlreadyExists(_) | WalletError::CannotRemoveCurrent(_) => {
                StatusCode::CONFLICT
            }
            WalletError::NotSupportedOnChain(_) | WalletError::RevertReasonUndecodable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            WalletError::RpcUnavailable(_)
            | WalletError::NonceUnavailable { .. }
            | WalletError::GasEstimation(_)
            | WalletError::BroadcastFailure(_) => StatusCode::BAD_GATEWAY,
            WalletError::SignFailure(_) | WalletError::Derivation(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            WalletError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        };
        tracing::warn!(error = %self, kind = self.kind(), "request failed");
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
