use rand::RngCore;
use rand_core::OsRng;
use sha2::Sha256;

use crate::error::CryptoError;

/// scrypt cost parameters as they appear in a V3 keystore's `kdfparams`.
///
/// The defaults match what web3.js writes when exporting a keystore file
/// (n = 8192, r = 8, p = 1, 32-byte output).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScryptParams {
    /// CPU/memory cost. Must be a power of two greater than 1.
    pub n: u32,
    /// Block size.
    pub r: u32,
    /// Parallelism.
    pub p: u32,
    /// Derived key length in bytes.
    pub dklen: u32,
}

impl Default for ScryptParams {
    fn default() -> Self {
        Self {
            n: 8192,
            r: 8,
            p: 1,
            dklen: 32,
        }
    }
}

/// Derives `params.dklen` bytes from `password` and `salt` using scrypt.
pub fn derive_scrypt(
    password: &[u8],
    salt: &[u8],
    params: &ScryptParams,
) -> Result<Vec<u8>, CryptoError> {
    if params.n < 2 || !params.n.is_power_of_two() {
        return Err(CryptoError::InvalidKdfParams(format!(
            "scrypt n must be a power of two greater than 1, got {}",
            params.n
        )));
    }

    let log_n = params.n.trailing_zeros() as u8;
    let scrypt_params = scrypt::Params::new(log_n, params.r, params.p, params.dklen as usize)
        .map_err(|e| CryptoError::InvalidKdfParams(format!("scrypt: {e}")))?;

    let mut output = vec![0u8; params.dklen as usize];
    scrypt::scrypt(password, salt, &scrypt_params, &mut output)
        .map_err(|e| CryptoError::KdfFailed(format!("scrypt: {e}")))?;

    Ok(output)
}

/// Derives `dklen` bytes from `password` and `salt` using
/// PBKDF2-HMAC-SHA256 with `rounds` iterations.
///
/// This is the alternative KDF the V3 keystore format allows
/// (`prf = "hmac-sha256"`); files written by this crate always use scrypt.
pub fn derive_pbkdf2_sha256(
    password: &[u8],
    salt: &[u8],
    rounds: u32,
    dklen: u32,
) -> Result<Vec<u8>, CryptoError> {
    if rounds == 0 {
        return Err(CryptoError::InvalidKdfParams(
            "pbkdf2 iteration count must be non-zero".into(),
        ));
    }

    let mut output = vec![0u8; dklen as usize];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, rounds, &mut output);
    Ok(output)
}

/// Generates a fresh random 32-byte KDF salt.
pub fn generate_salt() -> [u8; 32] {
    let mut salt = [0u8; 32];
    OsRng.fill_bytes(&mut salt);
    salt
}
