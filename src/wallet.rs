//! Hierarchical-deterministic key derivation.
//!
//! Mnemonics arrive with each request, are turned into a signing key for the
//! duration of one operation, and are dropped. Nothing in this module stores
//! or logs key material; intermediate seed and key buffers are zeroized.
//!
//! Derivation follows BIP-39 (seed), BIP-32 (child keys), and BIP-44 (path
//! convention, `m/44'/60'/0'/0/i` for EVM accounts).

use std::str::FromStr;

use alloy_primitives::{Address, B256};
use alloy_signer_local::PrivateKeySigner;
use bip39::{Language, Mnemonic};
use coins_bip32::path::DerivationPath;
use coins_bip32::prelude::SigningKey;
use coins_bip32::xkeys::XPriv;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::WalletError;

/// Default account path for EVM chains.
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Default path prefix for batch derivation; the account index is appended.
pub const DEFAULT_BATCH_PREFIX: &str = "m/44'/60'/0'/0";

/// Generates a fresh BIP-39 mnemonic from the process CSPRNG.
///
/// Strength 128 produces 12 words, 256 produces 24. Any other value is
/// treated as 128.
pub fn generate_mnemonic(strength: u32) -> Result<String, WalletError> {
    let entropy_len = match strength {
        256 => 32,
        _ => 16,
    };
    let mut entropy = Zeroizing::new([0u8; 32]);
    rand::rng().fill_bytes(&mut entropy[..entropy_len]);
    let mnemonic = Mnemonic::from_entropy(&entropy[..entropy_len])
        .map_err(|e| WalletError::Derivation(format!("mnemonic encoding: {e}")))?;
    Ok(mnemonic.to_string())
}

/// True when the phrase passes BIP-39 word-list and checksum validation.
pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_in_normalized(Language::English, phrase).is_ok()
}

/// Parses a BIP-44 path, rejecting empty paths, bare `m`, and relative
/// paths without the `m/` anchor.
pub fn parse_path(path: &str) -> Result<DerivationPath, WalletError> {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed == "m" {
        return Err(WalletError::InvalidPath {
            path: path.to_string(),
            reason: "path has no child segments".to_string(),
        });
    }
    if !trimmed.starts_with("m/") {
        return Err(WalletError::InvalidPath {
            path: path.to_string(),
            reason: "path must be anchored at m/".to_string(),
        });
    }
    DerivationPath::from_str(trimmed).map_err(|e| WalletError::InvalidPath {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Derives the signing key and its EVM address at `path`.
///
/// The returned signer is scoped to a single sign-and-broadcast: callers must
/// drop it as soon as the signature exists, on every exit path.
///
/// # Errors
/// [`WalletError::InvalidMnemonic`] on checksum or word-list failure,
/// [`WalletError::InvalidPath`] on a malformed path, and
/// [`WalletError::Derivation`] if BIP-32 derivation fails below the parser.
pub fn derive_signing_key(
    phrase: &str,
    path: &str,
) -> Result<(PrivateKeySigner, Address), WalletError> {
    let path = parse_path(path)?;
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    // Always the empty passphrase; the seed is wiped when this scope ends.
    let seed = Zeroizing::new(mnemonic.to_seed(""));
    let root = XPriv::root_from_seed(seed.as_ref(), None)
        .map_err(|e| WalletError::Derivation(format!("master key: {e}")))?;
    let child = root
        .derive_path(&path)
        .map_err(|e| WalletError::Derivation(format!("child key: {e}")))?;
    let key: &SigningKey = child.as_ref();
    let key_bytes = Zeroizing::new(key.to_bytes());
    let signer = PrivateKeySigner::from_bytes(&B256::from_slice(key_bytes.as_slice()))
        .map_err(|e| WalletError::Derivation(e.to_string()))?;
    let address = signer.address();
    Ok((signer, address))
}

/// Derives the EVM address at `path` without handing out the key.
pub fn derive_address(phrase: &str, path: &str) -> Result<Address, WalletError> {
    let (_, address) = derive_signing_key(phrase, path)?;
    Ok(address)
}

/// Derives `count` consecutive addresses at `prefix/start .. prefix/start+count-1`.
///
/// `prefix` defaults to [`DEFAULT_BATCH_PREFIX`]; `count` must be positive.
pub fn derive_batch(
    phrase: &str,
    prefix: Option<&str>,
    start: u32,
    count: u32,
) -> Result<Vec<Address>, WalletError> {
    let prefix = prefix.unwrap_or(DEFAULT_BATCH_PREFIX).trim_end_matches('/');
    if count == 0 {
        return Err(WalletError::InvalidPath {
            path: prefix.to_string(),
            reason: "batch count must be positive".to_string(),
        });
    }
    (0..count)
        .map(|i| derive_address(phrase, &format!("{prefix}/{}", start.saturating_add(i))))
        .collect()
}
