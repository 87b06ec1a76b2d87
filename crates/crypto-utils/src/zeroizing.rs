use std::ops::Deref;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// A byte buffer that is zeroed when dropped.
///
/// Holds decrypted private-key material and derived KDF output so that
/// secrets do not linger in memory after the operation that needed them.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies the secret into a fixed-size array, failing on length
    /// mismatch. The copy inherits the caller's responsibility to zeroize.
    pub fn to_array<const N: usize>(&self) -> Result<[u8; N], CryptoError> {
        self.0.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidInput(format!(
                "expected {N} bytes of secret material, got {}",
                self.0.len()
            ))
        })
    }
}

impl Deref for SecretBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

// Deliberately no Debug impl that prints contents; redact instead.
impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretBytes").field(&"[REDACTED]").finish()
    }
}
