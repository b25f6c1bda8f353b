//! Configuration for the wallet service.
//!
//! The config file is JSON, selected with `--config` or the `CONFIG`
//! environment variable. Each entry under `networks` describes one chain
//! endpoint; RPC URLs may reference environment variables (`$VAR` or
//! `${VAR}`) so credentials stay out of the file.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use alloy_primitives::U256;
use clap::Parser;
use serde::Deserialize;
use url::Url;

use crate::error::WalletError;
use crate::types::{ChainKind, NetworkDescriptor};

/// CLI arguments for the wallet server.
#[derive(Parser, Debug)]
#[command(name = "walletd")]
#[command(about = "Multi-chain HD wallet HTTP service")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    port: u16,
    #[serde(default = "config_defaults::default_host")]
    host: IpAddr,
    #[serde(default)]
    networks: BTreeMap<String, NetworkConfig>,
}

/// Configuration for a single network, keyed by network id.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Display name; defaults to the network id.
    #[serde(default)]
    pub name: Option<String>,
    /// JSON-RPC endpoint; may be `$VAR` / `${VAR}`.
    pub rpc_url: String,
    /// Chain id; required (> 0) for EVM networks.
    #[serde(default)]
    pub chain_id: u64,
    /// Native currency symbol.
    pub symbol: String,
    #[serde(default = "config_defaults::default_decimals")]
    pub decimals: u8,
    #[serde(default)]
    pub testnet: bool,
    #[serde(default)]
    pub block_explorer: Option<Url>,
    #[serde(default = "config_defaults::default_min_confirmations")]
    pub min_confirmations: u64,
    /// Ceiling on gas price / fee cap in wei, if any.
    #[serde(default)]
    pub max_gas_price: Option<U256>,
    #[serde(default = "config_defaults::default_enabled")]
    pub enabled: bool,
}

mod config_defaults {
    use std::net::{IpAddr, Ipv4Addr};

    pub fn default_port() -> u16 {
        8080
    }

    pub fn default_host() -> IpAddr {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    }

    pub fn default_decimals() -> u8 {
        18
    }

    pub fn default_min_confirmations() -> u64 {
        1
    }

    pub fn default_enabled() -> bool {
        true
    }
}

impl Config {
    /// Loads the configuration addressed by the CLI arguments.
    pub fn load() -> Result<Self, WalletError> {
        let args = CliArgs::parse();
        Self::from_file(&args.config)
    }

    pub fn from_file(path: &Path) -> Result<Self, WalletError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| WalletError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, WalletError> {
        serde_json::from_str(raw).map_err(|e| WalletError::Config(format!("parse config: {e}")))
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Validated descriptors for every enabled network, in id order.
    pub fn descriptors(&self) -> Result<Vec<NetworkDescriptor>, WalletError> {
        self.networks
            .iter()
            .filter(|(_, network)| network.enabled)
            .map(|(id, network)| network.descriptor(id))
            .collect()
    }
}

impl NetworkConfig {
    /// Validates this entry and produces the immutable runtime descriptor.
    fn descriptor(&self, id: &str) -> Result<NetworkDescriptor, WalletError> {
        let rpc_url = resolve_env_refs(&self.rpc_url)?;
        if rpc_url.trim().is_empty() {
            return Err(WalletError::Config(format!("network {id}: empty rpc_url")));
        }
        let rpc_url: Url = rpc_url
            .parse()
            .map_err(|e| WalletError::Config(format!("network {id}: invalid rpc_url: {e}")))?;
        if self.symbol.trim().is_empty() {
            return Err(WalletError::Config(format!("network {id}: empty symbol")));
        }
        if ChainKind::from_network_id(id) == ChainKind::Evm && self.chain_id == 0 {
            return Err(WalletError::Config(format!(
                "network {id}: chain_id must be positive"
            )));
        }
        Ok(NetworkDescriptor {
            id: id.to_string(),
            name: self.name.clone().unwrap_or_else(|| id.to_string()),
            rpc_url,
            chain_id: self.chain_id,
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            testnet: self.testnet,
            block_explorer: self.block_explorer.clone(),
            min_confirmations: self.min_confirmations,
            max_gas_price: self.max_gas_price,
        })
    }
}

/// Resolves `$VAR` and `${VAR}` references against the environment;
/// anything else passes through as a literal.
fn resolve_env_refs(value: &str) -> Result<String, WalletError> {
    let name = if let Some(inner) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(inner)
    } else if let Some(inner) = value.strip_prefix('$') {
        inner
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_')
            .then_some(inner)
    } else {
        None
    };
    match name {
        Some(name) if !name.is_empty() => env::var(name).map_err(|_| {
            WalletError::Config(format!(
                "environment variable {name:?} not set (referenced as {value:?})"
            ))
        }),
        _ => Ok(value.to_string()),
    }
}
