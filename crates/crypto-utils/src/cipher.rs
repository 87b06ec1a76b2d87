use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;
use rand_core::OsRng;

use crate::error::CryptoError;

/// AES-128 in CTR mode with a big-endian counter, as used by the V3
/// keystore `aes-128-ctr` cipher.
type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// AES-128-CTR IV size in bytes.
pub const IV_SIZE: usize = 16;

/// Encrypts `plaintext` with AES-128-CTR under `key` and `iv`.
///
/// The IV is not prepended; the keystore record carries it separately in
/// `cipherparams.iv`.
pub fn aes128_ctr_encrypt(key: &[u8; 16], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    let mut buf = plaintext.to_vec();
    let mut cipher = Aes128Ctr::new(key.into(), iv.into());
    cipher.apply_keystream(&mut buf);
    buf
}

/// Decrypts AES-128-CTR `ciphertext` under `key` and `iv`.
///
/// CTR is an XOR stream, so this is the same keystream application as
/// encryption; a separate entry point keeps call sites readable.
pub fn aes128_ctr_decrypt(key: &[u8; 16], iv: &[u8; 16], ciphertext: &[u8]) -> Vec<u8> {
    aes128_ctr_encrypt(key, iv, ciphertext)
}

/// Parses a 16-byte IV from a slice (e.g. a hex-decoded keystore field).
pub fn iv_from_slice(bytes: &[u8]) -> Result<[u8; 16], CryptoError> {
    bytes.try_into().map_err(|_| {
        CryptoError::InvalidInput(format!(
            "expected a {}-byte iv, got {} bytes",
            IV_SIZE,
            bytes.len()
        ))
    })
}

/// Generates a fresh random 16-byte IV.
pub fn generate_iv() -> [u8; 16] {
    let mut iv = [0u8; 16];
    OsRng.fill_bytes(&mut iv);
    iv
}
