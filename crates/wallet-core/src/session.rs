//! Wallet session state and its opaque persistence seam.
//!
//! The host supplies a [`SessionStore`] (browser local storage, a keychain,
//! a file — the core does not care). The serialized wallet carries only
//! the encrypted keystore and public metadata, never key material.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::keystore::Keystore;

/// Key under which the serialized wallet is stored.
pub const SESSION_KEY: &str = "wallet";

/// Session-level wallet state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Canonical (0x-lowercase) address.
    pub address: String,
    pub keystore: Keystore,
    pub is_logged_in: bool,
}

/// Opaque key/value blob store supplied by the host.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: &[u8]);
    fn remove(&self, key: &str);
}

/// In-memory store for tests and embedders without a platform store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &[u8]) {
        self.entries().insert(key.to_string(), value.to_vec());
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }
}

/// Persists the wallet under the fixed session key.
pub fn save_wallet(store: &dyn SessionStore, wallet: &Wallet) -> Result<(), WalletError> {
    let bytes =
        serde_json::to_vec(wallet).map_err(|e| WalletError::SessionStore(e.to_string()))?;
    store.set(SESSION_KEY, &bytes);
    Ok(())
}

/// Loads the persisted wallet, if one exists.
pub fn load_wallet(store: &dyn SessionStore) -> Result<Option<Wallet>, WalletError> {
    match store.get(SESSION_KEY) {
        None => Ok(None),
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| WalletError::SessionStore(e.to_string())),
    }
}

/// Removes the persisted wallet.
pub fn clear_wallet(store: &dyn SessionStore) {
    store.remove(SESSION_KEY);
}
