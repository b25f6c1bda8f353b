//! ERC-20 calldata packing and return-value unpacking.
//!
//! Covers the function subset the wallet uses: `balanceOf`, `transfer`,
//! `approve`, `allowance`, `name`, `symbol`, `decimals`. Selectors and
//! head/tail layout come from the `sol!`-generated bindings; the helpers
//! here exist so the adapter and the history scanner share one codec and
//! one pair of error kinds.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, sol};

use crate::error::WalletError;

sol! {
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256 balance);
        function transfer(address to, uint256 amount) external returns (bool success);
        function approve(address spender, uint256 amount) external returns (bool success);
        function allowance(address owner, address spender) external view returns (uint256 remaining);
        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
    }
}

/// First four bytes of `keccak256("transfer(address,uint256)")`.
pub const TRANSFER_SELECTOR: [u8; 4] = IERC20::transferCall::SELECTOR;

/// Encoded length of a `transfer(address,uint256)` call: selector + two words.
pub const TRANSFER_CALLDATA_LEN: usize = 68;

pub fn transfer_calldata(to: Address, amount: U256) -> Bytes {
    IERC20::transferCall { to, amount }.abi_encode().into()
}

pub fn approve_calldata(spender: Address, amount: U256) -> Bytes {
    IERC20::approveCall { spender, amount }.abi_encode().into()
}

pub fn balance_of_calldata(owner: Address) -> Bytes {
    IERC20::balanceOfCall { owner }.abi_encode().into()
}

pub fn allowance_calldata(owner: Address, spender: Address) -> Bytes {
    IERC20::allowanceCall { owner, spender }.abi_encode().into()
}

pub fn name_calldata() -> Bytes {
    IERC20::nameCall {}.abi_encode().into()
}

pub fn symbol_calldata() -> Bytes {
    IERC20::symbolCall {}.abi_encode().into()
}

pub fn decimals_calldata() -> Bytes {
    IERC20::decimalsCall {}.abi_encode().into()
}

/// Splits `transfer(address,uint256)` calldata back into `(to, amount)`.
///
/// Returns `None` unless the input is exactly selector + 64-byte tail with
/// the transfer selector. The recipient sits in bytes `[16..36]`, the amount
/// in `[36..68]`.
pub fn decode_transfer_input(input: &[u8]) -> Option<(Address, U256)> {
    if input.len() != TRANSFER_CALLDATA_LEN || input[..4] != TRANSFER_SELECTOR {
        return None;
    }
    let to = Address::from_slice(&input[16..36]);
    let amount = U256::from_be_slice(&input[36..68]);
    Some((to, amount))
}

pub fn decode_balance(data: &[u8]) -> Result<U256, WalletError> {
    IERC20::balanceOfCall::abi_decode_returns(data)
        .map_err(|e| WalletError::AbiDecoding(format!("balanceOf return: {e}")))
}

pub fn decode_allowance(data: &[u8]) -> Result<U256, WalletError> {
    IERC20::allowanceCall::abi_decode_returns(data)
        .map_err(|e| WalletError::AbiDecoding(format!("allowance return: {e}")))
}

pub fn decode_name(data: &[u8]) -> Result<String, WalletError> {
    IERC20::nameCall::abi_decode_returns(data)
        .map_err(|e| WalletError::AbiDecoding(format!("name return: {e}")))
}

pub fn decode_symbol(data: &[u8]) -> Result<String, WalletError> {
    IERC20::symbolCall::abi_decode_returns(data)
        .map_err(|e| WalletError::AbiDecoding(format!("symbol return: {e}")))
}

/// Unpacks a `decimals()` return.
///
/// Some tokens answer with a full `uint256` word instead of `uint8`; both
/// are accepted and the low 8 bits are returned.
pub fn decode_decimals(data: &[u8]) -> Result<u8, WalletError> {
    if data.len() < 32 {
        return Err(WalletError::AbiDecoding(format!(
            "decimals return too short: {} bytes",
            data.len()
        )));
    }
    Ok(data[31])
}
