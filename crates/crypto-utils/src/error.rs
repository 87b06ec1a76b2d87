use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KdfFailed(String),

    #[error("invalid kdf parameters: {0}")]
    InvalidKdfParams(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
