//! Argon2id key derivation for passphrase → file key.

use {
    argon2::Argon2,
    base64::{Engine, engine::general_purpose::STANDARD},
    rand::RngCore,
    serde::{Deserialize, Serialize},
    zeroize::Zeroizing,
};

use crate::error::VaultError;

/// Argon2id cost parameters, persisted in the credentials file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 64 MiB = 65536).
    pub m_cost: u32,
    /// Number of iterations (default: 3).
    pub t_cost: u32,
    /// Degree of parallelism (default: 1).
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

/// Salt plus parameters: everything needed to re-derive the file key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfHeader {
    /// Base64-encoded 16-byte salt.
    pub salt: String,
    pub params: KdfParams,
}

impl KdfHeader {
    /// Fresh header with a random salt.
    pub fn generate(params: KdfParams) -> Self {
        Self {
            salt: generate_salt(),
            params,
        }
    }

    pub fn derive(&self, passphrase: &[u8]) -> Result<Zeroizing<[u8; 32]>, VaultError> {
        let salt = decode_salt(&self.salt)?;
        derive_key(passphrase, &salt, &self.params)
    }
}

/// Derive a 256-bit key from a passphrase and salt using Argon2id.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; 32]>, VaultError> {
    let argon2_params = argon2::Params::new(params.m_cost, params.t_cost, params.p_cost, Some(32))
        .map_err(|e| VaultError::CipherError(format!("invalid KDF params: {e}")))?;
    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase, salt, output.as_mut())
        .map_err(|e| VaultError::CipherError(format!("KDF failed: {e}")))?;
    Ok(output)
}

/// Random 16-byte salt, base64-encoded.
pub fn generate_salt() -> String {
    let mut salt = [0u8; 16];
    rand::rng().fill_bytes(&mut salt);
    STANDARD.encode(salt)
}

pub fn decode_salt(b64: &str) -> Result<Vec<u8>, VaultError> {
    Ok(STANDARD.decode(b64)?)
}
