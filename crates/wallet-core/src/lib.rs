//! Wallet keystore and transaction lifecycle engine.
//!
//! This crate ties the workspace together: key generation and V3 keystore
//! encryption ([`keystore`]), session persistence behind a host-supplied
//! store ([`session`]), and the build→sign→broadcast→confirm pipeline
//! ([`pipeline`]) driving the token-sale contract through a
//! [`chain_client::ChainRpc`] node connection.
//!
//! Presentation is entirely the caller's concern: every operation returns
//! a structured result or terminal [`pipeline::Outcome`], never a
//! user-facing message.

pub mod config;
pub mod error;
pub mod keypair;
pub mod keystore;
pub mod pipeline;
pub mod session;

use secrecy::SecretString;

pub use config::Config;
pub use crypto_utils::kdf::ScryptParams;
pub use error::WalletError;
pub use keypair::KeyPair;
pub use keystore::Keystore;
pub use pipeline::{
    FailureKind, Outcome, PasswordProvider, PipelineBusy, PipelineState, TransactionPipeline,
};
pub use session::{MemoryStore, SessionStore, Wallet};

/// Creates a new wallet: a fresh keypair encrypted under `password`.
///
/// The plaintext key exists only inside this call; what comes back is the
/// session wallet holding the keystore record.
pub fn create_wallet(
    password: &SecretString,
    params: &ScryptParams,
) -> Result<Wallet, WalletError> {
    let keypair = KeyPair::generate();
    let keystore = keystore::encrypt(keypair.secret_bytes(), password, params)?;

    Ok(Wallet {
        address: keypair.address().to_string(),
        keystore,
        is_logged_in: true,
    })
}

/// Logs into an existing wallet by proving the password decrypts its
/// keystore. The decrypted key is discarded immediately.
pub fn login(wallet: &mut Wallet, password: &SecretString) -> Result<(), WalletError> {
    keystore::decrypt(&wallet.keystore, password)?;
    wallet.is_logged_in = true;
    Ok(())
}

/// Logs out and removes the persisted session.
pub fn logout(wallet: &mut Wallet, store: &dyn SessionStore) {
    wallet.is_logged_in = false;
    session::clear_wallet(store);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> ScryptParams {
        ScryptParams {
            n: 4,
            r: 8,
            p: 1,
            dklen: 32,
        }
    }

    #[test]
    fn create_wallet_yields_logged_in_session() {
        let wallet = create_wallet(&SecretString::from("pw"), &fast_params()).unwrap();

        assert!(wallet.is_logged_in);
        assert!(wallet.address.starts_with("0x"));
        assert_eq!(wallet.address.len(), 42);
        assert_eq!(format!("0x{}", wallet.keystore.address), wallet.address);
    }

    #[test]
    fn login_with_correct_password_succeeds() {
        let mut wallet = create_wallet(&SecretString::from("pw"), &fast_params()).unwrap();
        wallet.is_logged_in = false;

        login(&mut wallet, &SecretString::from("pw")).unwrap();
        assert!(wallet.is_logged_in);
    }

    #[test]
    fn login_with_wrong_password_fails() {
        let mut wallet = create_wallet(&SecretString::from("pw"), &fast_params()).unwrap();
        wallet.is_logged_in = false;

        let result = login(&mut wallet, &SecretString::from("nope"));
        assert!(matches!(result, Err(WalletError::InvalidPassword)));
        assert!(!wallet.is_logged_in);
    }

    #[test]
    fn logout_clears_the_session_store() {
        let store = MemoryStore::new();
        let mut wallet = create_wallet(&SecretString::from("pw"), &fast_params()).unwrap();
        session::save_wallet(&store, &wallet).unwrap();

        logout(&mut wallet, &store);

        assert!(!wallet.is_logged_in);
        assert!(session::load_wallet(&store).unwrap().is_none());
    }

    #[test]
    fn two_wallets_have_distinct_addresses() {
        let a = create_wallet(&SecretString::from("pw"), &fast_params()).unwrap();
        let b = create_wallet(&SecretString::from("pw"), &fast_params()).unwrap();
        assert_ne!(a.address, b.address);
    }
}
