//! In-process backend.

use std::collections::HashMap;

use {async_trait::async_trait, secrecy::SecretString, tokio::sync::RwLock, zeroize::Zeroizing};

use crate::{error::VaultError, traits::CredentialVault};

/// Secrets held in memory for the lifetime of the process.
///
/// Values are zeroized when removed or when the vault is dropped.
#[derive(Default)]
pub struct MemoryVault {
    secrets: RwLock<HashMap<String, Zeroizing<String>>>,
}

impl std::fmt::Debug for MemoryVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVault").finish_non_exhaustive()
    }
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, reference: impl Into<String>, secret: impl Into<String>) {
        self.secrets
            .write()
            .await
            .insert(reference.into(), Zeroizing::new(secret.into()));
    }

    /// Returns `true` if a secret was stored under `reference`.
    pub async fn remove(&self, reference: &str) -> bool {
        self.secrets.write().await.remove(reference).is_some()
    }

    pub async fn references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self.secrets.read().await.keys().cloned().collect();
        refs.sort();
        refs
    }
}

#[async_trait]
impl CredentialVault for MemoryVault {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn resolve(&self, reference: &str) -> Result<SecretString, VaultError> {
        match self.secrets.read().await.get(reference) {
            Some(value) if !value.is_empty() => Ok(SecretString::new(value.as_str().to_owned())),
            _ => Err(VaultError::not_found(reference)),
        }
    }
}
