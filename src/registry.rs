//! Multi-chain network registry.
//!
//! Owns every live adapter, keyed by network id, together with the
//! currently selected network. One reader-writer lock guards both so a
//! switch is atomic with respect to lookups; mutations only ever insert or
//! remove map entries and never touch the network. Adapters are cloned out
//! of the lock, so no lock is held across an RPC call.

use std::collections::HashMap;

use alloy_primitives::U256;
use futures_util::future::join_all;
use tokio::sync::RwLock;
use url::Url;

use crate::chain::{ChainAdapter, NetworkAdapter};
use crate::error::WalletError;
use crate::types::{ChainKind, NetworkDescriptor, NetworkHealth, NetworkInfo};

/// Networks tried, in order, when picking the initial selection.
const PREFERRED_DEFAULTS: [&str; 4] = ["ethereum", "sepolia", "solana", "bitcoin"];

#[derive(Debug)]
struct RegistryInner {
    adapters: HashMap<String, NetworkAdapter>,
    current: String,
}

#[derive(Debug)]
pub struct NetworkRegistry {
    inner: RwLock<RegistryInner>,
}

impl NetworkRegistry {
    /// Builds adapters for every descriptor. A descriptor that fails to
    /// initialize is logged and skipped; an empty result is a configuration
    /// error. The initial selection prefers `ethereum`, then `sepolia`,
    /// `solana`, `bitcoin`, then the first EVM network, then anything.
    pub fn from_descriptors(descriptors: Vec<NetworkDescriptor>) -> Result<Self, WalletError> {
        let mut adapters = HashMap::new();
        for descriptor in descriptors {
            let id = descriptor.id.clone();
            let kind = ChainKind::from_network_id(&id);
            match NetworkAdapter::connect(kind, descriptor) {
                Ok(adapter) => {
                    tracing::info!(network = %id, %kind, "registered network");
                    adapters.insert(id, adapter);
                }
                Err(error) => {
                    tracing::warn!(network = %id, %error, "skipping network that failed to initialize");
                }
            }
        }
        if adapters.is_empty() {
            return Err(WalletError::Config(
                "no network adapter could be initialized".to_string(),
            ));
        }
        let current = Self::default_network(&adapters);
        tracing::info!(network = %current, "selected default network");
        Ok(Self {
            inner: RwLock::new(RegistryInner { adapters, current }),
        })
    }

    fn default_network(adapters: &HashMap<String, NetworkAdapter>) -> String {
        for preferred in PREFERRED_DEFAULTS {
            if adapters.contains_key(preferred) {
                return preferred.to_string();
            }
        }
        let mut ids: Vec<&String> = adapters.keys().collect();
        ids.sort();
        for id in &ids {
            if adapters[*id].kind() == ChainKind::Evm {
                return (*id).clone();
            }
        }
        ids[0].clone()
    }

    /// Id of the currently selected network.
    pub async fn current_network(&self) -> String {
        self.inner.read().await.current.clone()
    }

    /// Adapter for the currently selected network.
    pub async fn current_adapter(&self) -> Result<NetworkAdapter, WalletError> {
        let inner = self.inner.read().await;
        inner
            .adapters
            .get(&inner.current)
            .cloned()
            .ok_or_else(|| WalletError::NetworkUnknown(inner.current.clone()))
    }

    /// Adapter for `id`.
    pub async fn adapter(&self, id: &str) -> Result<NetworkAdapter, WalletError> {
        self.inner
            .read()
            .await
            .adapters
            .get(id)
            .cloned()
            .ok_or_else(|| WalletError::NetworkUnknown(id.to_string()))
    }

    /// Selects `id` as the current network.
    pub async fn switch_network(&self, id: &str) -> Result<(), WalletError> {
        let mut inner = self.inner.write().await;
        if !inner.adapters.contains_key(id) {
            return Err(WalletError::NetworkUnknown(id.to_string()));
        }
        inner.current = id.to_string();
        Ok(())
    }

    /// Registers an ad-hoc network. Descriptor fields beyond the RPC URL
    /// take family defaults; EVM chain ids are discovered from the node.
    pub async fn add_network(
        &self,
        id: &str,
        rpc_url: &str,
        chain_type: &str,
    ) -> Result<(), WalletError> {
        let kind: ChainKind = chain_type
            .parse()
            .map_err(|e: String| WalletError::Config(e))?;
        let rpc_url: Url = rpc_url
            .parse()
            .map_err(|e| WalletError::Config(format!("invalid rpc url: {e}")))?;
        let descriptor = NetworkDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            rpc_url,
            chain_id: 0,
            symbol: match kind {
                ChainKind::Evm => "ETH".to_string(),
                ChainKind::Solana => "SOL".to_string(),
                ChainKind::Bitcoin => "BTC".to_string(),
            },
            decimals: match kind {
                ChainKind::Evm => 18,
                ChainKind::Solana => 9,
                ChainKind::Bitcoin => 8,
            },
            testnet: false,
            block_explorer: None,
            min_confirmations: 1,
            max_gas_price: None,
        };

        let mut inner = self.inner.write().await;
        if inner.adapters.contains_key(id) {
            return Err(WalletError::NetworkAlreadyExists(id.to_string()));
        }
        let adapter = NetworkAdapter::connect(kind, descriptor)?;
        inner.adapters.insert(id.to_string(), adapter);
        Ok(())
    }

    /// Removes `id`; the current network cannot be removed.
    pub async fn remove_network(&self, id: &str) -> Result<(), WalletError> {
        let mut inner = self.inner.write().await;
        if inner.current == id {
            return Err(WalletError::CannotRemoveCurrent(id.to_string()));
        }
        inner
            .adapters
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| WalletError::NetworkUnknown(id.to_string()))
    }

    /// Probes one network. Errors only when `id` is unknown; an unreachable
    /// node is reported inside the health value.
    pub async fn check_network_health(&self, id: &str) -> Result<NetworkHealth, WalletError> {
        let adapter = self.adapter(id).await?;
        Ok(probe(&adapter).await)
    }

    /// Probes every registered network concurrently. Unreachable networks
    /// are reported per entry; the aggregate never fails.
    pub async fn check_all_networks_health(&self) -> HashMap<String, NetworkHealth> {
        let adapters = self.snapshot().await;
        let probes = adapters.iter().map(|(id, adapter)| async move {
            (id.clone(), probe(adapter).await)
        });
        join_all(probes).await.into_iter().collect()
    }

    /// Enumerates every registered network with live chain data for EVM
    /// networks and zero placeholders for the rest.
    pub async fn available_networks(&self) -> Vec<NetworkInfo> {
        let mut adapters = self.snapshot().await;
        adapters.sort_by(|a, b| a.0.cmp(&b.0));
        let infos = adapters.into_iter().map(|(id, adapter)| async move {
            let descriptor = adapter.descriptor().clone();
            let kind = adapter.kind();
            let (chain_id, latest_block, gas) = match adapter.evm() {
                Some(evm) => (
                    evm.chain_id().await.unwrap_or(descriptor.chain_id),
                    evm.latest_block().await.unwrap_or(0),
                    evm.get_gas_suggestion().await.ok(),
                ),
                None => (0, 0, None),
            };
            NetworkInfo {
                id,
                name: descriptor.name,
                kind,
                symbol: descriptor.symbol,
                testnet: descriptor.testnet,
                chain_id,
                latest_block,
                gas,
            }
        });
        join_all(infos).await
    }

    /// Native balances of `address` on each requested network. A network
    /// that is unknown or unreachable records a zero balance; the batch
    /// never fails.
    pub async fn cross_chain_balance(
        &self,
        address: &str,
        networks: &[String],
    ) -> HashMap<String, U256> {
        let lookups = networks.iter().map(|id| async move {
            let balance = match self.adapter(id).await {
                Ok(adapter) => adapter.get_balance(address).await.unwrap_or(U256::ZERO),
                Err(_) => U256::ZERO,
            };
            (id.clone(), balance)
        });
        join_all(lookups).await.into_iter().collect()
    }

    async fn snapshot(&self) -> Vec<(String, NetworkAdapter)> {
        self.inner
            .read()
            .await
            .adapters
            .iter()
            .map(|(id, adapter)| (id.clone(), adapter.clone()))
            .collect()
    }
}

async fn probe(adapter: &NetworkAdapter) -> NetworkHealth {
    match adapter.health().await {
        Ok(block) => NetworkHealth {
            ok: true,
            latest_block: (adapter.kind() == ChainKind::Evm).then_some(block),
            error: None,
        },
        Err(error) => NetworkHealth {
            ok: false,
            latest_block: None,
            error: Some(error.to_string()),
        },
    }
}
