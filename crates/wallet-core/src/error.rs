use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid password")]
    InvalidPassword,

    #[error("malformed keystore: {0}")]
    MalformedKeystore(String),

    #[error("unsupported kdf: {0}")]
    UnsupportedKdf(String),

    #[error("corrupt keystore: {0}")]
    CorruptKeystore(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("session store failure: {0}")]
    SessionStore(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("crypto failure: {0}")]
    Crypto(String),

    #[error("chain encoding failure: {0}")]
    Chain(String),

    #[error("rpc failure: {0}")]
    Rpc(String),
}

impl From<crypto_utils::CryptoError> for WalletError {
    fn from(e: crypto_utils::CryptoError) -> Self {
        WalletError::Crypto(e.to_string())
    }
}

impl From<chain_eth::EthError> for WalletError {
    fn from(e: chain_eth::EthError) -> Self {
        WalletError::Chain(e.to_string())
    }
}

impl From<chain_client::RpcError> for WalletError {
    fn from(e: chain_client::RpcError) -> Self {
        WalletError::Rpc(e.to_string())
    }
}
