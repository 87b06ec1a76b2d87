//! ABI encoding and decoding for the fixed contract interface.
//!
//! Every supported call takes only static 32-byte-word arguments, so no
//! head/tail encoding for dynamic types is needed. The one dynamic value
//! this module understands is the string inside a standard
//! `Error(string)` revert payload.

use alloy_primitives::U256;
use sha3::{Digest, Keccak256};

use crate::error::EthError;

/// Selector of the standard `Error(string)` revert wrapper: `0x08c379a0`.
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// A single statically-encoded ABI argument.
#[derive(Debug, Clone)]
pub enum AbiValue {
    /// A 20-byte address, left-padded to 32 bytes.
    Address([u8; 20]),
    /// A 256-bit unsigned integer, big-endian.
    Uint(U256),
    /// A boolean, 0 or 1 in the low byte.
    Bool(bool),
}

/// Computes the 4-byte function selector for a canonical signature string
/// such as `"transfer(address,uint256)"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&hash[..4]);
    sel
}

/// Encodes a contract call: selector followed by each argument as a
/// 32-byte word.
pub fn encode_call(signature: &str, args: &[AbiValue]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + args.len() * 32);
    data.extend_from_slice(&selector(signature));

    for arg in args {
        data.extend_from_slice(&encode_word(arg));
    }

    data
}

fn encode_word(value: &AbiValue) -> [u8; 32] {
    match value {
        AbiValue::Address(addr) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(addr);
            word
        }
        AbiValue::Uint(amount) => amount.to_be_bytes::<32>(),
        AbiValue::Bool(flag) => {
            let mut word = [0u8; 32];
            word[31] = *flag as u8;
            word
        }
    }
}

/// Decodes a single `uint256` return value.
pub fn decode_uint256(data: &[u8]) -> Result<U256, EthError> {
    let word = first_word(data)?;
    Ok(U256::from_be_bytes::<32>(word))
}

/// Decodes a single `bool` return value. Any non-zero word is `true`.
pub fn decode_bool(data: &[u8]) -> Result<bool, EthError> {
    let word = first_word(data)?;
    Ok(word.iter().any(|&b| b != 0))
}

fn first_word(data: &[u8]) -> Result<[u8; 32], EthError> {
    if data.len() < 32 {
        return Err(EthError::DecodingError(format!(
            "expected a 32-byte word, got {} bytes",
            data.len()
        )));
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&data[..32]);
    Ok(word)
}

/// Decodes a revert payload into a human-readable reason.
///
/// If the data is a standard `Error(string)` encoding, the inner string is
/// returned. Anything else (custom errors, panics, empty data) comes back
/// as unmodified 0x-hex so no information is lost.
pub fn decode_revert_reason(data: &[u8]) -> String {
    match decode_error_string(data) {
        Some(reason) => reason,
        None => format!("0x{}", hex::encode(data)),
    }
}

fn decode_error_string(data: &[u8]) -> Option<String> {
    if data.len() < 4 + 64 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }

    let body = &data[4..];

    // Head: offset of the string within the body (0x20 in practice).
    let offset = word_to_usize(&body[..32])?;
    let len_start = offset.checked_add(32)?;
    if body.len() < len_start {
        return None;
    }

    let str_len = word_to_usize(&body[offset..len_start])?;
    let str_end = len_start.checked_add(str_len)?;
    if body.len() < str_end {
        return None;
    }

    String::from_utf8(body[len_start..str_end].to_vec()).ok()
}

fn word_to_usize(word: &[u8]) -> Option<usize> {
    if word.len() < 32 || word[..24].iter().any(|&b| b != 0) {
        return None;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..32]);
    usize::try_from(u64::from_be_bytes(buf)).ok()
}
