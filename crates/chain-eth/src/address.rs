use sha3::{Digest, Keccak256};

use crate::error::EthError;

/// Canonicalizes an Ethereum address string.
///
/// Strips an optional `0x`/`0X` prefix, lower-cases the remaining hex, and
/// re-adds `0x`. The result is the form used for comparisons, keystore
/// records, and RPC parameters. Idempotent for every valid input.
pub fn normalize(address: &str) -> Result<String, EthError> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    Ok(format!("0x{}", hex_part.to_lowercase()))
}

/// Parses an address string into its 20 raw bytes.
pub fn parse(address: &str) -> Result<[u8; 20], EthError> {
    let normalized = normalize(address)?;
    let bytes = hex::decode(&normalized[2..])
        .map_err(|e| EthError::InvalidAddress(format!("invalid hex: {e}")))?;

    let mut addr = [0u8; 20];
    addr.copy_from_slice(&bytes);
    Ok(addr)
}

/// Derives the canonical address from an uncompressed secp256k1 public key
/// (65 bytes, starting with 0x04).
///
/// The address is the last 20 bytes of the Keccak-256 hash of the 64-byte
/// key body, returned in normalized (lowercase) form.
pub fn from_pubkey(uncompressed_pubkey: &[u8; 65]) -> Result<String, EthError> {
    if uncompressed_pubkey[0] != 0x04 {
        return Err(EthError::InvalidPublicKey(
            "uncompressed key must start with 0x04".into(),
        ));
    }

    let hash = Keccak256::digest(&uncompressed_pubkey[1..]);
    Ok(format!("0x{}", hex::encode(&hash[12..])))
}

/// Applies EIP-55 mixed-case checksum encoding for display purposes.
pub fn checksum(address: &str) -> Result<String, EthError> {
    let normalized = normalize(address)?;
    let hex_part = &normalized[2..];

    let hash = Keccak256::digest(hex_part.as_bytes());
    let hash_hex = hex::encode(hash);

    let mut checksummed = String::with_capacity(42);
    checksummed.push_str("0x");

    for (i, c) in hex_part.chars().enumerate() {
        if c.is_ascii_digit() {
            checksummed.push(c);
        } else {
            let hash_nibble = u8::from_str_radix(&hash_hex[i..i + 1], 16).unwrap_or(0);
            if hash_nibble >= 8 {
                checksummed.push(c.to_ascii_uppercase());
            } else {
                checksummed.push(c);
            }
        }
    }

    Ok(checksummed)
}
