//! Environment-variable backend.

use std::collections::HashMap;

use {async_trait::async_trait, secrecy::SecretString};

use crate::{error::VaultError, traits::CredentialVault};

/// Resolves `env:NAME` (or a bare `NAME`) from the process environment.
///
/// Entries in the override map take precedence over the real environment,
/// which keeps lookups hermetic in tests.
#[derive(Debug, Default)]
pub struct EnvVault {
    overrides: HashMap<String, String>,
    read_process_env: bool,
}

impl EnvVault {
    /// Vault backed by the process environment.
    pub fn new() -> Self {
        Self {
            overrides: HashMap::new(),
            read_process_env: true,
        }
    }

    /// Vault that only sees `vars`, never the real environment.
    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self {
            overrides: vars,
            read_process_env: false,
        }
    }

    fn var_name(reference: &str) -> Result<&str, VaultError> {
        let name = reference.strip_prefix("env:").unwrap_or(reference).trim();
        if name.is_empty() || name.contains('=') || name.contains('\0') {
            return Err(VaultError::InvalidReference(reference.to_string()));
        }
        Ok(name)
    }

    fn lookup(&self, name: &str) -> Option<String> {
        if let Some(v) = self.overrides.get(name) {
            return Some(v.clone());
        }
        if self.read_process_env {
            return std::env::var(name).ok();
        }
        None
    }
}

#[async_trait]
impl CredentialVault for EnvVault {
    fn name(&self) -> &'static str {
        "env"
    }

    async fn resolve(&self, reference: &str) -> Result<SecretString, VaultError> {
        let name = Self::var_name(reference)?;
        match self.lookup(name) {
            Some(value) if !value.trim().is_empty() => Ok(SecretString::new(value)),
            _ => Err(VaultError::not_found(reference)),
        }
    }
}
