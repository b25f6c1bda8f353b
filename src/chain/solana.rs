//! Solana chain adapter.
//!
//! Declared but intentionally thin: balance reads go to the configured RPC
//! endpoint, while outbound transfers and token operations are not wired up
//! yet and report `NotSupportedOnChain`. The adapter exists so the registry
//! and the capability interface treat Solana networks uniformly.

use std::str::FromStr;

use alloy_primitives::U256;
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_pubkey::Pubkey;
use tokio_util::sync::CancellationToken;

use crate::chain::ChainAdapter;
use crate::error::WalletError;
use crate::types::{ChainKind, GasSuggestion, NetworkDescriptor, SendOptions};

pub struct SolanaAdapter {
    descriptor: NetworkDescriptor,
    rpc: RpcClient,
}

impl std::fmt::Debug for SolanaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaAdapter")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl SolanaAdapter {
    pub fn connect(descriptor: NetworkDescriptor) -> Self {
        let rpc = RpcClient::new_with_commitment(
            descriptor.rpc_url.to_string(),
            CommitmentConfig::confirmed(),
        );
        Self { descriptor, rpc }
    }

    pub fn descriptor(&self) -> &NetworkDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl ChainAdapter for SolanaAdapter {
    fn id(&self) -> &str {
        &self.descriptor.id
    }

    fn kind(&self) -> ChainKind {
        ChainKind::Solana
    }

    /// Balance in lamports.
    async fn get_balance(&self, address: &str) -> Result<U256, WalletError> {
        let pubkey = Pubkey::from_str(address.trim())
            .map_err(|_| WalletError::InvalidAddress(address.to_string()))?;
        let lamports = self
            .rpc
            .get_balance(&pubkey)
            .await
            .map_err(|e| WalletError::RpcUnavailable(format!("getBalance: {e}")))?;
        Ok(U256::from(lamports))
    }

    async fn send_transaction(
        &self,
        _mnemonic: &str,
        _path: &str,
        _to: &str,
        _amount: U256,
        _options: SendOptions,
        _cancel: CancellationToken,
    ) -> Result<String, WalletError> {
        Err(WalletError::NotSupportedOnChain(format!(
            "{}: solana transfers are not implemented",
            self.descriptor.id
        )))
    }

    /// Solana has no gas market; every fee field is zero.
    async fn gas_suggestion(&self) -> Result<GasSuggestion, WalletError> {
        Ok(GasSuggestion::conservative(0, 0, 0, 0))
    }

    async fn health(&self) -> Result<u64, WalletError> {
        Ok(0)
    }
}
