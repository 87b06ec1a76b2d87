//! # crypto-utils
//!
//! Password-based key derivation, stream-cipher encryption, and memory
//! safety utilities for the wallet keystore.
//!
//! The primitives here match the standard Ethereum V3 keystore convention:
//! scrypt (or PBKDF2-HMAC-SHA256) for key derivation and AES-128-CTR for
//! the private-key ciphertext.

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod zeroizing;

pub use error::CryptoError;
