//! Vault error types.

/// Errors produced while resolving or storing credentials.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// No secret is stored under the reference (or it resolved to an empty value).
    #[error("credential not found: {reference}")]
    NotFound { reference: String },

    /// The reference is syntactically unusable (e.g. `env:` with no name).
    #[error("invalid credential reference: {0:?}")]
    InvalidReference(String),

    /// The encrypted store has not been unlocked.
    #[error("vault is sealed")]
    Sealed,

    /// The passphrase does not unlock the credentials file.
    #[error("incorrect vault passphrase")]
    BadPassphrase,

    /// Encryption or decryption failed (tampered data, wrong key).
    #[error("cipher error: {0}")]
    CipherError(String),

    /// Base64 decoding failed.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Reading or writing the credentials file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    pub(crate) fn not_found(reference: &str) -> Self {
        Self::NotFound {
            reference: reference.to_string(),
        }
    }
}
