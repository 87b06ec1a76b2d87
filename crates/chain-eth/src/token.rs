//! Typed calldata for the token-sale contract.
//!
//! The wallet talks to exactly one contract shape: an ERC-20-style token
//! with a payable `buyToken()` sale entry point. Calldata is always built
//! from the canonical signature strings here, never by hand.

use alloy_primitives::U256;

use crate::abi::{self, AbiValue};
use crate::address;
use crate::error::EthError;

/// The token uses the conventional 18 decimals.
pub const DECIMALS: u32 = 18;

const BALANCE_OF: &str = "balanceOf(address)";
const TRANSFER: &str = "transfer(address,uint256)";
const APPROVE: &str = "approve(address,uint256)";
const TOTAL_SUPPLY: &str = "totalSupply()";
const BUY_TOKEN: &str = "buyToken()";

/// Calldata for `balanceOf(address) -> uint256`.
pub fn balance_of(owner: &str) -> Result<Vec<u8>, EthError> {
    let owner = address::parse(owner)?;
    Ok(abi::encode_call(BALANCE_OF, &[AbiValue::Address(owner)]))
}

/// Calldata for `transfer(address,uint256) -> bool`.
pub fn transfer(to: &str, amount: U256) -> Result<Vec<u8>, EthError> {
    let to = address::parse(to)?;
    Ok(abi::encode_call(
        TRANSFER,
        &[AbiValue::Address(to), AbiValue::Uint(amount)],
    ))
}

/// Calldata for `approve(address,uint256) -> bool`.
pub fn approve(spender: &str, amount: U256) -> Result<Vec<u8>, EthError> {
    let spender = address::parse(spender)?;
    Ok(abi::encode_call(
        APPROVE,
        &[AbiValue::Address(spender), AbiValue::Uint(amount)],
    ))
}

/// Calldata for `totalSupply() -> uint256`.
pub fn total_supply() -> Vec<u8> {
    abi::encode_call(TOTAL_SUPPLY, &[])
}

/// Calldata for the payable `buyToken()` sale entry point.
pub fn buy_token() -> Vec<u8> {
    abi::encode_call(BUY_TOKEN, &[])
}

/// Converts a whole-token count into base units (10^18 per token).
pub fn to_base_units(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(DECIMALS))
}

/// Decodes the `uint256` result of `balanceOf` / `totalSupply`.
pub fn decode_uint(data: &[u8]) -> Result<U256, EthError> {
    abi::decode_uint256(data)
}

/// Decodes the `bool` result of `transfer` / `approve`.
pub fn decode_success(data: &[u8]) -> Result<bool, EthError> {
    abi::decode_bool(data)
}
