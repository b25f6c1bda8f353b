//! Bitcoin chain adapter.
//!
//! A declared stub: the network can be registered, selected, and
//! enumerated, but reads and writes report `NotSupportedOnChain` until a
//! UTXO backend lands. Health always succeeds so a configured Bitcoin
//! network does not drag down aggregate health checks.

use alloy_primitives::U256;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::chain::ChainAdapter;
use crate::error::WalletError;
use crate::types::{ChainKind, GasSuggestion, NetworkDescriptor, SendOptions};

#[derive(Debug)]
pub struct BitcoinAdapter {
    descriptor: NetworkDescriptor,
}

impl BitcoinAdapter {
    pub fn new(descriptor: NetworkDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &NetworkDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl ChainAdapter for BitcoinAdapter {
    fn id(&self) -> &str {
        &self.descriptor.id
    }

    fn kind(&self) -> ChainKind {
        ChainKind::Bitcoin
    }

    async fn get_balance(&self, _address: &str) -> Result<U256, WalletError> {
        Err(WalletError::NotSupportedOnChain(format!(
            "{}: bitcoin balance lookups are not implemented",
            self.descriptor.id
        )))
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
            "{}: bitcoin transfers are not implemented",
            self.descriptor.id
        )))
    }

    async fn gas_suggestion(&self) -> Result<GasSuggestion, WalletError> {
        Ok(GasSuggestion::conservative(0, 0, 0, 0))
    }

    async fn health(&self) -> Result<u64, WalletError> {
        Ok(0)
    }
}
