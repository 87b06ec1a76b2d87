use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use rand::RngCore;
use rand_core::OsRng;
use zeroize::Zeroizing;

use chain_eth::address;

use crate::error::WalletError;

/// A secp256k1 keypair with its derived Ethereum address.
///
/// The private scalar lives in a zeroizing container and is cleared when
/// the pair is dropped, so a `KeyPair`'s lifetime should be scoped to the
/// single operation that needs it.
pub struct KeyPair {
    secret: Zeroizing<[u8; 32]>,
    public_key: [u8; 65],
    address: String,
}

impl KeyPair {
    /// Builds a keypair from raw private-key bytes.
    ///
    /// Fails for zero and for values at or above the secp256k1 group
    /// order, which are not valid scalars.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, WalletError> {
        let secret_key = SecretKey::from_bytes(bytes.into())
            .map_err(|e| WalletError::KeyGeneration(format!("invalid scalar: {e}")))?;

        let point = secret_key.public_key().to_encoded_point(false);
        let mut public_key = [0u8; 65];
        public_key.copy_from_slice(point.as_bytes());

        let address = address::from_pubkey(&public_key)?;

        Ok(Self {
            secret: Zeroizing::new(*bytes),
            public_key,
            address,
        })
    }

    /// Generates a fresh keypair from the OS random source.
    ///
    /// Draws are rejection-sampled: a candidate outside the valid scalar
    /// range is discarded and redrawn.
    pub fn generate() -> Self {
        loop {
            let mut candidate = Zeroizing::new([0u8; 32]);
            OsRng.fill_bytes(&mut *candidate);

            if let Ok(keypair) = Self::from_secret_bytes(&candidate) {
                return keypair;
            }
        }
    }

    /// The raw private scalar. Callers must not let copies outlive the
    /// operation at hand.
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    /// Uncompressed SEC1 public key (0x04 || x || y).
    pub fn public_key(&self) -> &[u8; 65] {
        &self.public_key
    }

    /// Canonical (0x-lowercase) address.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
