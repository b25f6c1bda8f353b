//! Transaction envelope construction and signing.
//!
//! Builds either the legacy (EIP-155 replay-protected) or the dynamic-fee
//! (EIP-1559) envelope, signs the consensus signature hash with secp256k1,
//! and produces the 2718 wire encoding that `eth_sendRawTransaction` expects.

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::{Decodable2718, Encodable2718};
use alloy_eips::eip2930::AccessList;
use alloy_primitives::{Address, B256, Bytes, TxKind, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;

use crate::error::WalletError;

/// Fee fields that select the envelope variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeParams {
    /// Legacy envelope with a single gas price, wei.
    Legacy { gas_price: u128 },
    /// Dynamic-fee envelope: priority fee and fee cap, wei.
    Eip1559 { tip_cap: u128, fee_cap: u128 },
}

/// Everything needed to build one envelope, resolved by the send pipeline.
#[derive(Debug, Clone)]
pub struct UnsignedTx {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    /// `None` would be contract creation; the wallet always calls.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub fees: FeeParams,
}

/// Signs `tx` and returns the envelope together with its transaction hash.
///
/// The signature hash is `keccak256` of the RLP signing form: the EIP-155
/// `[..., chainId, 0, 0]` shape for legacy, `0x02 || rlp([...])` for
/// dynamic fee. Nonces are deterministic (RFC 6979) so signing is a pure
/// function of key and payload.
pub fn sign_transaction(
    signer: &PrivateKeySigner,
    tx: UnsignedTx,
) -> Result<(TxEnvelope, B256), WalletError> {
    let to = tx.to.map_or(TxKind::Create, TxKind::Call);
    match tx.fees {
        FeeParams::Legacy { gas_price } => {
            let legacy = TxLegacy {
                chain_id: Some(tx.chain_id),
                nonce: tx.nonce,
                gas_price,
                gas_limit: tx.gas_limit,
                to,
                value: tx.value,
                input: tx.data,
            };
            let signature = signer
                .sign_hash_sync(&legacy.signature_hash())
                .map_err(|e| WalletError::SignFailure(e.to_string()))?;
            let signed = legacy.into_signed(signature);
            let hash = *signed.hash();
            Ok((TxEnvelope::Legacy(signed), hash))
        }
        FeeParams::Eip1559 { tip_cap, fee_cap } => {
            let dynamic = TxEip1559 {
                chain_id: tx.chain_id,
                nonce: tx.nonce,
                gas_limit: tx.gas_limit,
                max_fee_per_gas: fee_cap,
                max_priority_fee_per_gas: tip_cap,
                to,
                value: tx.value,
                access_list: AccessList::default(),
                input: tx.data,
            };
            let signature = signer
                .sign_hash_sync(&dynamic.signature_hash())
                .map_err(|e| WalletError::SignFailure(e.to_string()))?;
            let signed = dynamic.into_signed(signature);
            let hash = *signed.hash();
            Ok((TxEnvelope::Eip1559(signed), hash))
        }
    }
}

/// 2718 wire encoding of a signed envelope (raw bytes for broadcast).
pub fn encode_signed(envelope: &TxEnvelope) -> Bytes {
    envelope.encoded_2718().into()
}

/// Parses a hex-encoded, already-signed envelope.
///
/// Rejects non-hex input and anything that does not decode as a complete
/// signed transaction; the bytes are forwarded unchanged on broadcast.
pub fn decode_raw(raw: &str) -> Result<TxEnvelope, WalletError> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(stripped)
        .map_err(|e| WalletError::BroadcastFailure(format!("raw transaction is not hex: {e}")))?;
    TxEnvelope::decode_2718(&mut bytes.as_slice())
        .map_err(|e| WalletError::BroadcastFailure(format!("malformed raw transaction: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::{DEFAULT_DERIVATION_PATH, derive_signing_key};
    use alloy_consensus::transaction::SignerRecoverable;
    use alloy_primitives::{address, U256};

    const VECTOR_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn vector_signer() -> (PrivateKeySigner, Address) {
        derive_signing_key(VECTOR_MNEMONIC, DEFAULT_DERIVATION_PATH).unwrap()
    }

    fn one_eth_to_bbbb(fees: FeeParams) -> UnsignedTx {
        UnsignedTx {
            chain_id: 1,
            nonce: 7,
            gas_limit: 21_000,
            to: Some(address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")),
            value: U256::from(10u64).pow(U256::from(18u64)),
            data: Bytes::new(),
            fees,
        }
    }

    #[test]
    fn legacy_recovers_to_derivation_address() {
        let (signer, address) = vector_signer();
        let tx = one_eth_to_bbbb(FeeParams::Legacy {
            gas_price: 20_000_000_000,
        });
        let (envelope, hash) = sign_transaction(&signer, tx).unwrap();
        assert_eq!(envelope.recover_signer().unwrap(), address);

        // EIP-155 on chain id 1: v = 1 * 2 + 35 + recovery id.
        let TxEnvelope::Legacy(signed) = &envelope else {
            panic!("expected a legacy envelope");
        };
        let recovery_id = u64::from(signed.signature().as_bytes()[64] - 27);
        assert!(matches!(35 + 2 + recovery_id, 37 | 38));

        let encoded = encode_signed(&envelope);
        // Legacy wire format is a plain RLP list.
        assert!(encoded[0] >= 0xc0);
        let decoded = decode_raw(&format!("0x{}", hex::encode(&encoded))).unwrap();
        assert_eq!(encode_signed(&decoded), encoded);
        assert_eq!(*decoded.tx_hash(), hash);
    }

    #[test]
    fn eip1559_recovers_to_derivation_address() {
        let (signer, address) = vector_signer();
        let tx = one_eth_to_bbbb(FeeParams::Eip1559 {
            tip_cap: 2_000_000_000,
            fee_cap: 40_000_000_000,
        });
        let (envelope, _) = sign_transaction(&signer, tx).unwrap();
        let encoded = encode_signed(&envelope);
        assert_eq!(encoded[0], 0x02);
        assert_eq!(envelope.recover_signer().unwrap(), address);
    }

    #[test]
    fn signing_is_deterministic() {
        let (signer, _) = vector_signer();
        let build = || {
            one_eth_to_bbbb(FeeParams::Legacy {
                gas_price: 20_000_000_000,
            })
        };
        let (first, first_hash) = sign_transaction(&signer, build()).unwrap();
        let (second, second_hash) = sign_transaction(&signer, build()).unwrap();
        assert_eq!(encode_signed(&first), encode_signed(&second));
        assert_eq!(first_hash, second_hash);
    }

    #[test]
    fn raw_decoding_rejects_garbage() {
        assert!(matches!(
            decode_raw("0xzz"),
            Err(WalletError::BroadcastFailure(_))
        ));
        assert!(matches!(
            decode_raw("0xdeadbeef"),
            Err(WalletError::BroadcastFailure(_))
        ));
    }
}
