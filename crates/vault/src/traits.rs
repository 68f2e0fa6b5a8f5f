//! Seams for secret lookup and authenticated encryption.

use {async_trait::async_trait, secrecy::SecretString};

use crate::error::VaultError;

/// Resolves a credential reference to its secret value.
///
/// Implementations must not log or otherwise expose the returned secret.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Short backend name for diagnostics ("env", "memory", "file").
    fn name(&self) -> &'static str;

    /// Look up `reference`. Missing or empty secrets are
    /// [`VaultError::NotFound`].
    async fn resolve(&self, reference: &str) -> Result<SecretString, VaultError>;
}

/// Trait for authenticated encryption with associated data (AEAD).
///
/// Each implementation has a unique version tag stored as the first byte of
/// every encrypted entry.
pub trait Cipher: Send + Sync {
    /// Unique identifier for this cipher.
    fn version_tag(&self) -> u8;

    /// Encrypt `plaintext` with `key` and `aad` (additional authenticated data).
    ///
    /// Returns `[nonce || ciphertext || tag]`; the exact layout is
    /// cipher-specific but must be parseable by [`decrypt`](Self::decrypt).
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, VaultError>;

    /// Decrypt a blob previously produced by [`encrypt`](Self::encrypt).
    fn decrypt(&self, key: &[u8; 32], ciphertext: &[u8], aad: &[u8])
    -> Result<Vec<u8>, VaultError>;
}
