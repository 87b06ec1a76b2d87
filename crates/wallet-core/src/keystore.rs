//! Password-protected private-key storage in the standard V3 keystore
//! format.
//!
//! Files written here are importable by geth, web3.js, and friends, and
//! vice versa: scrypt (or PBKDF2-HMAC-SHA256) key derivation, AES-128-CTR
//! encryption, and a Keccak-256 MAC over the second half of the derived
//! key and the ciphertext.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use subtle::ConstantTimeEq;
use uuid::Uuid;
use zeroize::Zeroize;

use chain_eth::address;
use crypto_utils::cipher;
use crypto_utils::kdf::{self, ScryptParams};
use crypto_utils::zeroizing::SecretBytes;
use crypto_utils::CryptoError;

use crate::error::WalletError;
use crate::keypair::KeyPair;

pub const KEYSTORE_VERSION: u32 = 3;
const CIPHER_NAME: &str = "aes-128-ctr";
const PBKDF2_PRF: &str = "hmac-sha256";

/// A V3 keystore record. Immutable once created; a new wallet replaces it
/// wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keystore {
    pub version: u32,
    pub id: String,
    /// Bare lowercase hex, no 0x prefix (V3 file convention).
    pub address: String,
    pub crypto: CryptoSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoSection {
    pub cipher: String,
    pub ciphertext: String,
    pub cipherparams: CipherParams,
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub mac: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

/// KDF parameters as they appear on disk. The variants carry disjoint
/// field sets, so untagged deserialization is unambiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KdfParams {
    Scrypt {
        dklen: u32,
        #[serde(alias = "N")]
        n: u32,
        r: u32,
        p: u32,
        salt: String,
    },
    Pbkdf2 {
        dklen: u32,
        c: u32,
        prf: String,
        salt: String,
    },
}

/// Encrypts a private key under `password`, producing a portable keystore
/// record.
pub fn encrypt(
    secret: &[u8; 32],
    password: &SecretString,
    params: &ScryptParams,
) -> Result<Keystore, WalletError> {
    if params.dklen != 32 {
        return Err(WalletError::Crypto(
            "keystore kdf must derive exactly 32 bytes".into(),
        ));
    }

    // Also validates the scalar before anything is written.
    let keypair = KeyPair::from_secret_bytes(secret)?;

    let salt = kdf::generate_salt();
    let derived = SecretBytes::new(kdf::derive_scrypt(
        password.expose_secret().as_bytes(),
        &salt,
        params,
    )?);

    let mut enc_key = [0u8; 16];
    enc_key.copy_from_slice(&derived[..16]);

    let iv = cipher::generate_iv();
    let ciphertext = cipher::aes128_ctr_encrypt(&enc_key, &iv, secret);
    enc_key.zeroize();

    let mac = compute_mac(&derived[16..32], &ciphertext);

    Ok(Keystore {
        version: KEYSTORE_VERSION,
        id: Uuid::new_v4().to_string(),
        address: keypair.address()[2..].to_string(),
        crypto: CryptoSection {
            cipher: CIPHER_NAME.to_string(),
            ciphertext: hex::encode(ciphertext),
            cipherparams: CipherParams {
                iv: hex::encode(iv),
            },
            kdf: "scrypt".to_string(),
            kdfparams: KdfParams::Scrypt {
                dklen: params.dklen,
                n: params.n,
                r: params.r,
                p: params.p,
                salt: hex::encode(salt),
            },
            mac: hex::encode(mac),
        },
    })
}

/// Decrypts a keystore record, returning the keypair it protects.
///
/// The MAC is checked in constant time before any decryption happens; a
/// mismatch is reported as `InvalidPassword` with no partial data. A MAC
/// that verifies but yields a key disagreeing with the declared address is
/// `CorruptKeystore`.
pub fn decrypt(keystore: &Keystore, password: &SecretString) -> Result<KeyPair, WalletError> {
    if keystore.version != KEYSTORE_VERSION {
        return Err(WalletError::MalformedKeystore(format!(
            "unsupported keystore version {}",
            keystore.version
        )));
    }

    if keystore.crypto.cipher != CIPHER_NAME {
        return Err(WalletError::MalformedKeystore(format!(
            "unsupported cipher {:?}",
            keystore.crypto.cipher
        )));
    }

    let ciphertext = hex_field(&keystore.crypto.ciphertext, "crypto.ciphertext")?;
    let iv_bytes = hex_field(&keystore.crypto.cipherparams.iv, "crypto.cipherparams.iv")?;
    let iv = cipher::iv_from_slice(&iv_bytes)
        .map_err(|e| WalletError::MalformedKeystore(e.to_string()))?;

    let declared_mac = hex_field(&keystore.crypto.mac, "crypto.mac")?;
    if declared_mac.len() != 32 {
        return Err(WalletError::MalformedKeystore(
            "crypto.mac must be 32 bytes".into(),
        ));
    }

    let derived = derive_key(&keystore.crypto, password)?;
    if derived.len() != 32 {
        return Err(WalletError::MalformedKeystore(
            "kdf output must be 32 bytes".into(),
        ));
    }

    let computed_mac = compute_mac(&derived[16..32], &ciphertext);
    if computed_mac
        .as_slice()
        .ct_eq(declared_mac.as_slice())
        .unwrap_u8()
        == 0
    {
        return Err(WalletError::InvalidPassword);
    }

    let mut enc_key = [0u8; 16];
    enc_key.copy_from_slice(&derived[..16]);
    let plaintext = SecretBytes::new(cipher::aes128_ctr_decrypt(&enc_key, &iv, &ciphertext));
    enc_key.zeroize();

    let mut secret: [u8; 32] = plaintext.to_array().map_err(|_| {
        WalletError::CorruptKeystore(format!(
            "decrypted key is {} bytes, expected 32",
            plaintext.len()
        ))
    })?;

    let keypair = KeyPair::from_secret_bytes(&secret)
        .map_err(|e| WalletError::CorruptKeystore(format!("decrypted key is invalid: {e}")));
    secret.zeroize();
    let keypair = keypair?;

    let declared_address = address::normalize(&keystore.address)
        .map_err(|e| WalletError::MalformedKeystore(e.to_string()))?;
    if declared_address != keypair.address() {
        return Err(WalletError::CorruptKeystore(format!(
            "declared address {declared_address} does not match the decrypted key"
        )));
    }

    Ok(keypair)
}

/// Parses a keystore from its JSON file form.
pub fn from_json(json: &str) -> Result<Keystore, WalletError> {
    serde_json::from_str(json).map_err(|e| WalletError::MalformedKeystore(e.to_string()))
}

/// Serializes a keystore to its JSON file form.
pub fn to_json(keystore: &Keystore) -> Result<String, WalletError> {
    serde_json::to_string(keystore).map_err(|e| WalletError::SessionStore(e.to_string()))
}

/// `mac = keccak256(mac_key || ciphertext)` per the V3 convention.
fn compute_mac(mac_key: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(mac_key);
    hasher.update(ciphertext);
    hasher.finalize().into()
}

fn derive_key(crypto: &CryptoSection, password: &SecretString) -> Result<SecretBytes, WalletError> {
    let password = password.expose_secret().as_bytes();

    match (crypto.kdf.as_str(), &crypto.kdfparams) {
        ("scrypt", KdfParams::Scrypt { dklen, n, r, p, salt }) => {
            let salt = hex_field(salt, "kdfparams.salt")?;
            let params = ScryptParams {
                n: *n,
                r: *r,
                p: *p,
                dklen: *dklen,
            };
            kdf::derive_scrypt(password, &salt, &params)
                .map(SecretBytes::new)
                .map_err(kdf_error)
        }
        ("pbkdf2", KdfParams::Pbkdf2 { dklen, c, prf, salt }) => {
            if prf != PBKDF2_PRF {
                return Err(WalletError::UnsupportedKdf(format!("pbkdf2 prf {prf:?}")));
            }
            let salt = hex_field(salt, "kdfparams.salt")?;
            kdf::derive_pbkdf2_sha256(password, &salt, *c, *dklen)
                .map(SecretBytes::new)
                .map_err(kdf_error)
        }
        ("scrypt" | "pbkdf2", _) => Err(WalletError::MalformedKeystore(
            "kdf name does not match kdfparams".into(),
        )),
        (other, _) => Err(WalletError::UnsupportedKdf(other.to_string())),
    }
}

fn kdf_error(e: CryptoError) -> WalletError {
    match e {
        CryptoError::InvalidKdfParams(msg) => WalletError::MalformedKeystore(msg),
        other => WalletError::Crypto(other.to_string()),
    }
}

fn hex_field(value: &str, field: &str) -> Result<Vec<u8>, WalletError> {
    hex::decode(value)
        .map_err(|e| WalletError::MalformedKeystore(format!("{field}: invalid hex: {e}")))
}
