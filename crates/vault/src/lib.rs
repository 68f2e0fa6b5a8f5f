//! Credential references resolved to secrets.
//!
//! Profiles never hold API keys directly; they carry a reference such as
//! `env:OPENAI_API_KEY` or `work-openrouter` that a [`CredentialVault`]
//! resolves at request time. Three backends are provided:
//!
//! - [`EnvVault`] reads the process environment.
//! - [`MemoryVault`] holds secrets for the lifetime of the process.
//! - [`FileVault`] keeps an encrypted JSON file, unlocked with a passphrase
//!   (Argon2id KDF, XChaCha20-Poly1305 per entry via the [`Cipher`] trait).

pub mod env;
pub mod error;
pub mod file;
pub mod kdf;
pub mod memory;
pub mod traits;
pub mod xchacha20;

use std::{path::PathBuf, sync::Arc};

use {
    modelscout_config::{VaultBackend, VaultConfig},
    secrecy::SecretString,
    tracing::{debug, warn},
};

pub use {
    env::EnvVault,
    error::VaultError,
    file::FileVault,
    memory::MemoryVault,
    traits::{Cipher, CredentialVault},
    xchacha20::XChaCha20Poly1305Cipher,
};

/// Build the vault selected by `config`.
///
/// The `file` backend reads its passphrase from the environment variable
/// named by `config.passphrase_env`; when that variable is unset or empty
/// the vault stays sealed and [`VaultError::Sealed`] is returned.
pub async fn open_vault(config: &VaultConfig) -> Result<Arc<dyn CredentialVault>, VaultError> {
    match config.backend {
        VaultBackend::Env => Ok(Arc::new(EnvVault::new())),
        VaultBackend::Memory => Ok(Arc::new(MemoryVault::new())),
        VaultBackend::File => {
            let path = config.path.clone().unwrap_or_else(default_file_path);
            let passphrase = match std::env::var(&config.passphrase_env) {
                Ok(p) if !p.is_empty() => SecretString::new(p),
                _ => {
                    warn!(
                        var = %config.passphrase_env,
                        "vault passphrase not set, credentials file stays sealed"
                    );
                    return Err(VaultError::Sealed);
                },
            };
            debug!(path = %path.display(), "opening credentials file");
            Ok(Arc::new(FileVault::open(path, &passphrase).await?))
        },
    }
}

fn default_file_path() -> PathBuf {
    modelscout_config::data_dir()
        .unwrap_or_else(|| PathBuf::from(".modelscout"))
        .join("credentials.json")
}
