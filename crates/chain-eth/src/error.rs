use thiserror::Error;

/// Ethereum encoding and signing errors.
#[derive(Debug, Error)]
pub enum EthError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("signing failed: {0}")]
    SigningError(String),

    #[error("abi decoding failed: {0}")]
    DecodingError(String),
}
