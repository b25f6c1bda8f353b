//! Chain adapters and the capability interface over them.
//!
//! Every network the service talks to is represented by one adapter bound to
//! one JSON-RPC endpoint. Adapters expose capabilities structurally:
//! everything satisfies [`ChainAdapter`]; chains with fungible-token support
//! additionally expose [`TokenSupporter`], discovered at runtime through
//! [`NetworkAdapter::token_support`]. Call sites query the capability once
//! and report `NotSupportedOnChain` when it is absent, so there is no
//! per-family branching outside this module.

pub mod bitcoin;
pub mod evm;
pub mod solana;

use std::sync::Arc;

use alloy_primitives::U256;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::chain::bitcoin::BitcoinAdapter;
use crate::chain::evm::EvmAdapter;
use crate::chain::solana::SolanaAdapter;
use crate::error::WalletError;
use crate::types::{ChainKind, GasSuggestion, NetworkDescriptor, SendOptions};

/// Operations every chain family supports.
///
/// Addresses cross this boundary as strings because formats differ per
/// family (hex for EVM, base58 for Solana); adapters parse and validate.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Registry id of the network this adapter is bound to.
    fn id(&self) -> &str;

    /// Chain family.
    fn kind(&self) -> ChainKind;

    /// Native-currency balance in the chain's smallest unit.
    async fn get_balance(&self, address: &str) -> Result<U256, WalletError>;

    /// Derives the key from the mnemonic, signs a native-currency transfer,
    /// broadcasts it, and returns the transaction hash.
    async fn send_transaction(
        &self,
        mnemonic: &str,
        path: &str,
        to: &str,
        amount: U256,
        options: SendOptions,
        cancel: CancellationToken,
    ) -> Result<String, WalletError>;

    /// Current fee guidance; all-zero fee fields when not applicable.
    async fn gas_suggestion(&self) -> Result<GasSuggestion, WalletError>;

    /// Cheap liveness probe; returns the latest block height where the
    /// chain has one.
    async fn health(&self) -> Result<u64, WalletError>;
}

/// Fungible-token operations, exposed only by chains that have them.
#[async_trait]
pub trait TokenSupporter: Send + Sync {
    async fn get_token_balance(&self, token: &str, owner: &str) -> Result<U256, WalletError>;

    async fn send_token_transaction(
        &self,
        mnemonic: &str,
        path: &str,
        token: &str,
        to: &str,
        amount: U256,
        options: SendOptions,
        cancel: CancellationToken,
    ) -> Result<String, WalletError>;
}

/// A live adapter bound to one network.
///
/// Cloning is cheap; the inner adapters are shared. The registry hands these
/// out by value so its lock is never held across a network call.
#[derive(Clone, Debug)]
pub enum NetworkAdapter {
    Evm(Arc<EvmAdapter>),
    Solana(Arc<SolanaAdapter>),
    Bitcoin(Arc<BitcoinAdapter>),
}

impl NetworkAdapter {
    /// Constructs the adapter variant for `kind` against `descriptor`.
    pub fn connect(kind: ChainKind, descriptor: NetworkDescriptor) -> Result<Self, WalletError> {
        match kind {
            ChainKind::Evm => Ok(NetworkAdapter::Evm(Arc::new(EvmAdapter::connect(
                descriptor,
            )?))),
            ChainKind::Solana => Ok(NetworkAdapter::Solana(Arc::new(SolanaAdapter::connect(
                descriptor,
            )))),
            ChainKind::Bitcoin => Ok(NetworkAdapter::Bitcoin(Arc::new(BitcoinAdapter::new(
                descriptor,
            )))),
        }
    }

    pub fn descriptor(&self) -> &NetworkDescriptor {
        match self {
            NetworkAdapter::Evm(adapter) => adapter.descriptor(),
            NetworkAdapter::Solana(adapter) => adapter.descriptor(),
            NetworkAdapter::Bitcoin(adapter) => adapter.descriptor(),
        }
    }

    fn as_chain(&self) -> &dyn ChainAdapter {
        match self {
            NetworkAdapter::Evm(adapter) => adapter.as_ref(),
            NetworkAdapter::Solana(adapter) => adapter.as_ref(),
            NetworkAdapter::Bitcoin(adapter) => adapter.as_ref(),
        }
    }

    /// Structural capability query: token operations, if this chain has any.
    pub fn token_support(&self) -> Option<&dyn TokenSupporter> {
        match self {
            NetworkAdapter::Evm(adapter) => Some(adapter.as_ref()),
            NetworkAdapter::Solana(_) | NetworkAdapter::Bitcoin(_) => None,
        }
    }

    /// The EVM adapter behind this network, for EVM-only surfaces
    /// (history scan, receipts, message signing).
    pub fn evm(&self) -> Option<&EvmAdapter> {
        match self {
            NetworkAdapter::Evm(adapter) => Some(adapter.as_ref()),
            _ => None,
        }
    }

    /// Like [`NetworkAdapter::evm`] but reports the spec error for the
    /// other families.
    pub fn require_evm(&self) -> Result<&EvmAdapter, WalletError> {
        self.evm().ok_or_else(|| {
            WalletError::NotSupportedOnChain(format!(
                "{} ({}) has no EVM surface",
                self.as_chain().id(),
                self.as_chain().kind()
            ))
        })
    }
}

#[async_trait]
impl ChainAdapter for NetworkAdapter {
    fn id(&self) -> &str {
        self.as_chain().id()
    }

    fn kind(&self) -> ChainKind {
        self.as_chain().kind()
    }

    async fn get_balance(&self, address: &str) -> Result<U256, WalletError> {
        self.as_chain().get_balance(address).await
    }

    async fn send_transaction(
        &self,
        mnemonic: &str,
        path: &str,
        to: &str,
        amount: U256,
        options: SendOptions,
        cancel: CancellationToken,
    ) -> Result<String, WalletError> {
        self.as_chain()
            .send_transaction(mnemonic, path, to, amount, options, cancel)
            .await
    }

    async fn gas_suggestion(&self) -> Result<GasSuggestion, WalletError> {
        self.as_chain().gas_suggestion().await
    }

    async fn health(&self) -> Result<u64, WalletError> {
        self.as_chain().health().await
    }
}
