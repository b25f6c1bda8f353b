//! walletd: an HTTP-fronted multi-chain HD wallet service.
//!
//! Clients submit BIP-39 mnemonics per request; the service derives signing
//! keys in memory, reads state from and broadcasts transactions to the
//! configured networks, and forgets the key material before responding.
//!
//! The crate is organized around three subsystems:
//!
//! - [`wallet`]: BIP-39/BIP-32/BIP-44 derivation of keys and addresses.
//! - [`chain`]: per-family adapters behind the [`chain::ChainAdapter`] and
//!   [`chain::TokenSupporter`] capability traits; the EVM adapter carries
//!   the transaction pipeline, receipts, revert decoding, message signing,
//!   and the block-range history scanner.
//! - [`registry`]: the multi-chain registry owning adapter instances and
//!   the current-network selection.
//!
//! [`handlers`] exposes the whole thing over axum; the core never touches
//! HTTP types.

pub mod chain;
pub mod config;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod telemetry;
pub mod types;
pub mod wallet;

pub use crate::chain::{ChainAdapter, NetworkAdapter, TokenSupporter};
pub use crate::error::WalletError;
pub use crate::registry::NetworkRegistry;
