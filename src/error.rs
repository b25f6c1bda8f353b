//! Error kinds exposed by the wallet core.
//!
//! One variant per failure class the adapters and the registry can surface.
//! Messages are human-readable and never contain mnemonics, seeds, or
//! private-key material. HTTP status mapping lives with the handlers.

use alloy_primitives::B256;

/// Represents all possible errors that may occur while deriving keys,
/// talking to a node, or routing between networks.
#[derive(thiserror::Error, Debug)]
pub enum WalletError {
    /// The mnemonic failed BIP-39 word-list or checksum validation.
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    /// The BIP-44 derivation path could not be parsed.
    #[error("Invalid derivation path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
    /// An address string is not hex, has the wrong length, or fails checksum parsing.
    #[error("Invalid address {0:?}")]
    InvalidAddress(String),
    /// BIP-32 key derivation failed below the parse layer.
    #[error("Key derivation failed: {0}")]
    Derivation(String),
    /// The node rejected the request or the transport failed.
    #[error("RPC unavailable: {0}")]
    RpcUnavailable(String),
    /// Either the pending or the latest nonce query failed.
    #[error("Nonce unavailable for {address}: {reason}")]
    NonceUnavailable { address: String, reason: String },
    /// `eth_estimateGas` failed; carries the node's reason verbatim.
    #[error("Gas estimation failed: {0}")]
    GasEstimation(String),
    /// Signing produced no signature.
    #[error("Signing failed: {0}")]
    SignFailure(String),
    /// `eth_sendRawTransaction` was rejected (insufficient funds, nonce too low, underpriced, ...).
    #[error("Broadcast rejected: {0}")]
    BroadcastFailure(String),
    /// The transaction is not mined yet, or the node does not know the hash.
    #[error("Receipt not found for {0}")]
    ReceiptNotFound(B256),
    /// The receipt does not report a revert, so there is no reason to decode.
    #[error("Transaction {0} did not revert")]
    RevertReasonUndecodable(B256),
    /// The selected chain does not expose the requested capability.
    #[error("Not supported on this chain: {0}")]
    NotSupportedOnChain(String),
    /// No network with this id is registered.
    #[error("Unknown network {0:?}")]
    NetworkUnknown(String),
    /// A network with this id is already registered.
    #[error("Network {0:?} already exists")]
    NetworkAlreadyExists(String),
    /// The currently selected network cannot be removed.
    #[error("Cannot remove the current network {0:?}")]
    CannotRemoveCurrent(String),
    /// Calldata packing failed.
    #[error("ABI encoding failed: {0}")]
    AbiEncoding(String),
    /// Return-value unpacking failed.
    #[error("ABI decoding failed: {0}")]
    AbiDecoding(String),
    /// The caller cancelled the operation before it completed.
    #[error("Operation cancelled")]
    Cancelled,
    /// Configuration was missing or inconsistent at load time.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WalletError {
    /// Stable machine-readable name for the error kind, used in HTTP bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            WalletError::InvalidMnemonic(_) => "invalid_mnemonic",
            WalletError::InvalidPath { .. } => "invalid_path",
            WalletError::InvalidAddress(_) => "invalid_address",
            WalletError::Derivation(_) => "derivation",
            WalletError::RpcUnavailable(_) => "rpc_unavailable",
            WalletError::NonceUnavailable { .. } => "nonce_unavailable",
            WalletError::GasEstimation(_) => "gas_estimation",
            WalletError::SignFailure(_) => "sign_failure",
            WalletError::BroadcastFailure(_) => "broadcast_failure",
            WalletError::ReceiptNotFound(_) => "receipt_not_found",
            WalletError::RevertReasonUndecodable(_) => "revert_reason_undecodable",
            WalletError::NotSupportedOnChain(_) => "not_supported_on_chain",
            WalletError::NetworkUnknown(_) => "network_unknown",
            WalletError::NetworkAlreadyExists(_) => "network_already_exists",
            WalletError::CannotRemoveCurrent(_) => "cannot_remove_current",
            WalletError::AbiEncoding(_) => "abi_encoding",
            WalletError::AbiDecoding(_) => "abi_decoding",
            WalletError::Cancelled => "cancelled",
            WalletError::Config(_) => "config",
        }
    }
}
