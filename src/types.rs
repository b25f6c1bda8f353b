//! JSON-serializable shapes shared between the chain adapters, the registry,
//! and the HTTP layer.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use url::Url;

/// Which blockchain family an adapter speaks.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Evm,
    Solana,
    Bitcoin,
}

impl std::fmt::Display for ChainKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainKind::Evm => write!(f, "evm"),
            ChainKind::Solana => write!(f, "solana"),
            ChainKind::Bitcoin => write!(f, "bitcoin"),
        }
    }
}

impl ChainKind {
    /// Family inferred from a network id: `solana*` and `bitcoin*` prefixes
    /// select those families, everything else defaults to EVM.
    pub fn from_network_id(id: &str) -> ChainKind {
        if id.starts_with("solana") {
            ChainKind::Solana
        } else if id.starts_with("bitcoin") {
            ChainKind::Bitcoin
        } else {
            ChainKind::Evm
        }
    }
}

impl std::str::FromStr for ChainKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "evm" => Ok(ChainKind::Evm),
            "solana" => Ok(ChainKind::Solana),
            "bitcoin" => Ok(ChainKind::Bitcoin),
            other => Err(format!("unknown chain type {other:?}")),
        }
    }
}

/// Immutable description of one configured network.
///
/// Built from the configuration file at startup or from an `add_network`
/// call; adapters hold it for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    /// Registry key, e.g. `ethereum` or `sepolia`.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Numeric chain id used for EIP-155 and EIP-712.
    pub chain_id: u64,
    /// Native currency symbol.
    pub symbol: String,
    /// Native currency decimals.
    pub decimals: u8,
    /// Whether the network is a testnet.
    pub testnet: bool,
    /// Block explorer base URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_explorer: Option<Url>,
    /// Confirmations to consider a transaction settled.
    pub min_confirmations: u64,
    /// Upper bound on the gas price / fee cap this service will sign, in wei.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gas_price: Option<U256>,
}

/// Caller-supplied overrides for the send pipeline. Absent fields are
/// resolved against the node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SendOptions {
    /// Explicit nonce; otherwise `eth_getTransactionCount(from, "pending")`.
    pub nonce: Option<u64>,
    /// Explicit gas limit; otherwise `eth_estimateGas`.
    pub gas_limit: Option<u64>,
    /// Legacy gas price in wei.
    pub gas_price: Option<u128>,
    /// EIP-1559 priority fee in wei. Presence selects the dynamic-fee envelope.
    pub tip_cap: Option<u128>,
    /// EIP-1559 fee cap in wei. Presence selects the dynamic-fee envelope.
    pub fee_cap: Option<u128>,
}

impl SendOptions {
    /// True when the caller asked for a dynamic-fee transaction.
    pub fn wants_eip1559(&self) -> bool {
        self.tip_cap.is_some() || self.fee_cap.is_some()
    }
}

/// Fee guidance for one chain. All fee fields are zero when the chain does
/// not expose EIP-1559 data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GasSuggestion {
    pub chain_id: u64,
    /// Latest block base fee, wei.
    pub base_fee: u128,
    /// Suggested priority fee, wei.
    pub tip_cap: u128,
    /// `base_fee + 2 * tip_cap`.
    pub max_fee: u128,
    /// Legacy gas price, wei.
    pub gas_price: u128,
}

impl GasSuggestion {
    /// Builds the conservative suggestion: `max_fee = base_fee + 2 * tip_cap`.
    pub fn conservative(chain_id: u64, base_fee: u128, tip_cap: u128, gas_price: u128) -> Self {
        Self {
            chain_id,
            base_fee,
            tip_cap,
            max_fee: base_fee.saturating_add(tip_cap.saturating_mul(2)),
            gas_price,
        }
    }
}

/// How a scanned transaction is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxClassification {
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "ERC20")]
    Erc20,
    #[serde(rename = "CONTRACT")]
    Contract,
}

/// Token details attached to an ERC-20 transfer found by the history scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTransferInfo {
    pub token_address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub amount: U256,
    pub to_address: Address,
}

/// One scanned transaction, normalized for the history response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub hash: B256,
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub value: U256,
    pub gas_price: u128,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub nonce: u64,
    pub block_number: u64,
    pub block_hash: B256,
    pub timestamp: u64,
    /// 1 success, 0 reverted.
    pub status: u8,
    #[serde(rename = "type")]
    pub classification: TxClassification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenTransferInfo>,
}

/// Transaction-type filter for the history scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxTypeFilter {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "ERC20")]
    Erc20,
    #[serde(rename = "CONTRACT")]
    Contract,
}

impl TxTypeFilter {
    pub fn matches(&self, classification: TxClassification) -> bool {
        match self {
            TxTypeFilter::All => true,
            TxTypeFilter::Eth => classification == TxClassification::Eth,
            TxTypeFilter::Erc20 => classification == TxClassification::Erc20,
            TxTypeFilter::Contract => classification == TxClassification::Contract,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySortField {
    #[default]
    Timestamp,
    BlockNumber,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

/// Parameters of a block-range history scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRequest {
    /// Address whose transactions to collect, as sender or recipient.
    pub address: Address,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub tx_type: TxTypeFilter,
    /// First block of the range; zero means `end_block - 1000`.
    #[serde(default)]
    pub start_block: u64,
    /// Last block of the range; zero or out-of-range clamps to latest.
    #[serde(default)]
    pub end_block: u64,
    #[serde(default)]
    pub sort_by: HistorySortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// Paginated history scan result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub transactions: Vec<TransactionSummary>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Snapshot of one registered network for the enumeration endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
    pub kind: ChainKind,
    pub symbol: String,
    pub testnet: bool,
    /// Chain id; zero for non-EVM placeholders.
    pub chain_id: u64,
    /// Latest block height; zero for non-EVM placeholders.
    pub latest_block: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<GasSuggestion>,
}

/// Outcome of a single network health probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkHealth {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// ERC-20 metadata triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// A produced signature together with the address that signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedMessage {
    /// 65-byte signature, hex-encoded with `0x` prefix.
    pub signature: String,
    pub address: Address,
}
