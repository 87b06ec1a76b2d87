use alloy_primitives::U256;
use alloy_rlp::{Encodable, RlpEncodable};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

use crate::address;
use crate::error::EthError;

/// An unsigned legacy (type 0) Ethereum transaction with EIP-155 replay
/// protection.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub nonce: u64,
    /// Gas price in wei.
    pub gas_price: U256,
    pub gas_limit: u64,
    /// Recipient address as a 0x-prefixed hex string.
    pub to: String,
    /// Transfer value in wei.
    pub value: U256,
    /// Calldata (empty for plain ETH transfers).
    pub data: Vec<u8>,
    pub chain_id: u64,
}

/// A signed legacy transaction ready for broadcast.
pub struct SignedTransaction {
    /// RLP-encoded signed transaction bytes.
    pub raw: Vec<u8>,
    /// Transaction hash as a 0x-prefixed hex string.
    pub hash: String,
}

/// Builds an unsigned contract-call transaction.
///
/// `value` is the ETH attached to the call (non-zero only for payable
/// entry points such as the token sale).
pub fn build_contract_call(
    chain_id: u64,
    nonce: u64,
    to: &str,
    value: U256,
    data: Vec<u8>,
    gas_price: U256,
    gas_limit: u64,
) -> Result<Transaction, EthError> {
    let to = address::normalize(to)?;

    Ok(Transaction {
        nonce,
        gas_price,
        gas_limit,
        to,
        value,
        data,
        chain_id,
    })
}

/// Signs a legacy transaction with the given secp256k1 private key.
///
/// The signing process:
/// 1. RLP-encode `[nonce, gasPrice, gas, to, value, data, chainId, 0, 0]`.
/// 2. Keccak-256 hash the encoding.
/// 3. Sign the hash with k256, recovering the y parity.
/// 4. Re-encode with `v = chainId * 2 + 35 + parity`, `r`, `s` appended.
/// 5. Hash the signed bytes for the transaction hash.
pub fn sign(tx: &Transaction, private_key: &[u8; 32]) -> Result<SignedTransaction, EthError> {
    let sighash = signing_hash(tx)?;

    let mut key_bytes = *private_key;
    let signing_key = SigningKey::from_bytes((&key_bytes).into())
        .map_err(|e| EthError::InvalidPrivateKey(e.to_string()))?;
    key_bytes.zeroize();

    let (signature, recovery_id): (Signature, RecoveryId) = signing_key
        .sign_prehash(&sighash)
        .map_err(|e| EthError::SigningError(e.to_string()))?;

    let v = tx.chain_id * 2 + 35 + recovery_id.is_y_odd() as u64;

    let mut r_bytes = [0u8; 32];
    let mut s_bytes = [0u8; 32];
    r_bytes.copy_from_slice(&signature.r().to_bytes());
    s_bytes.copy_from_slice(&signature.s().to_bytes());

    let signed_fields = SignedFields {
        nonce: tx.nonce,
        gas_price: RlpU256(tx.gas_price.to_be_bytes::<32>()),
        gas_limit: tx.gas_limit,
        to: RlpAddress(address::parse(&tx.to)?),
        value: RlpU256(tx.value.to_be_bytes::<32>()),
        data: tx.data.clone(),
        v,
        r: RlpU256(r_bytes),
        s: RlpU256(s_bytes),
    };

    let mut raw = Vec::new();
    signed_fields.encode(&mut raw);

    let hash = Keccak256::digest(&raw);

    Ok(SignedTransaction {
        raw,
        hash: format!("0x{}", hex::encode(hash)),
    })
}

/// Computes the EIP-155 signing hash:
/// `keccak256(rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0]))`.
pub fn signing_hash(tx: &Transaction) -> Result<[u8; 32], EthError> {
    let unsigned_fields = UnsignedFields {
        nonce: tx.nonce,
        gas_price: RlpU256(tx.gas_price.to_be_bytes::<32>()),
        gas_limit: tx.gas_limit,
        to: RlpAddress(address::parse(&tx.to)?),
        value: RlpU256(tx.value.to_be_bytes::<32>()),
        data: tx.data.clone(),
        chain_id: tx.chain_id,
        zero_r: 0u8,
        zero_s: 0u8,
    };

    let mut rlp_buf = Vec::new();
    unsigned_fields.encode(&mut rlp_buf);

    Ok(Keccak256::digest(&rlp_buf).into())
}

// ---------------------------------------------------------------------------
// RLP-encodable structures
// ---------------------------------------------------------------------------

/// Unsigned legacy transaction fields with the EIP-155 `[chainId, 0, 0]`
/// tail for replay protection.
#[derive(RlpEncodable)]
struct UnsignedFields {
    nonce: u64,
    gas_price: RlpU256,
    gas_limit: u64,
    to: RlpAddress,
    value: RlpU256,
    data: Vec<u8>,
    chain_id: u64,
    zero_r: u8,
    zero_s: u8,
}

/// Signed legacy transaction fields.
#[derive(RlpEncodable)]
struct SignedFields {
    nonce: u64,
    gas_price: RlpU256,
    gas_limit: u64,
    to: RlpAddress,
    value: RlpU256,
    data: Vec<u8>,
    v: u64,
    r: RlpU256,
    s: RlpU256,
}

/// Wrapper encoding a 20-byte address as a fixed-length RLP string.
#[derive(Debug, Clone)]
struct RlpAddress([u8; 20]);

impl Encodable for RlpAddress {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.0.as_slice().encode(out);
    }

    fn length(&self) -> usize {
        self.0.as_slice().length()
    }
}

/// Wrapper encoding a 256-bit integer as minimal big-endian bytes with
/// leading zeros stripped (standard RLP integer encoding).
#[derive(Debug, Clone)]
struct RlpU256([u8; 32]);

impl Encodable for RlpU256 {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        let start = self.0.iter().position(|&b| b != 0).unwrap_or(32);
        self.0[start..].encode(out);
    }

    fn length(&self) -> usize {
        let start = self.0.iter().position(|&b| b != 0).unwrap_or(32);
        self.0[start..].length()
    }
}
