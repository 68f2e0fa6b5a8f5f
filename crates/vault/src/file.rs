//! Encrypted credentials file.
//!
//! Layout (JSON):
//!
//! ```json
//! {
//!   "version": 1,
//!   "kdf": { "salt": "<b64>", "params": { "m_cost": 65536, "t_cost": 3, "p_cost": 1 } },
//!   "verifier": "<b64>",
//!   "entries": { "<reference>": "<b64>" }
//! }
//! ```
//!
//! Every blob is `[cipher version tag][cipher output]`. Entries are sealed
//! with the reference as associated data, so an entry copied under another
//! reference fails to decrypt.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD},
    secrecy::{ExposeSecret, SecretString},
    serde::{Deserialize, Serialize},
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
    zeroize::Zeroizing,
};

use crate::{
    error::VaultError,
    kdf::{KdfHeader, KdfParams},
    traits::{Cipher, CredentialVault},
    xchacha20::XChaCha20Poly1305Cipher,
};

const FORMAT_VERSION: u32 = 1;
const VERIFIER_AAD: &[u8] = b"modelscout:verifier";
const VERIFIER_PLAINTEXT: &[u8] = b"modelscout-vault";

#[derive(Debug, Serialize, Deserialize)]
struct VaultFile {
    version: u32,
    kdf: KdfHeader,
    verifier: String,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// Passphrase-unlocked credentials file.
///
/// The derived key stays in memory (zeroized on drop); the file itself is
/// re-read on every lookup so concurrent writers are picked up.
pub struct FileVault<C: Cipher = XChaCha20Poly1305Cipher> {
    path: PathBuf,
    cipher: C,
    kdf: KdfHeader,
    verifier: String,
    key: Zeroizing<[u8; 32]>,
    write_lock: Mutex<()>,
}

impl<C: Cipher> std::fmt::Debug for FileVault<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileVault")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileVault<XChaCha20Poly1305Cipher> {
    /// Open (or create) the credentials file at `path`.
    pub async fn open(
        path: impl Into<PathBuf>,
        passphrase: &SecretString,
    ) -> Result<Self, VaultError> {
        Self::open_with(path, passphrase, XChaCha20Poly1305Cipher, KdfParams::default()).await
    }
}

impl<C: Cipher> FileVault<C> {
    /// Open with an explicit cipher. `params` only apply when the file is
    /// created; an existing file keeps the parameters in its header.
    pub async fn open_with(
        path: impl Into<PathBuf>,
        passphrase: &SecretString,
        cipher: C,
        params: KdfParams,
    ) -> Result<Self, VaultError> {
        let path = path.into();
        let secret = passphrase.expose_secret().as_bytes();

        if let Some(file) = read_file(&path).await? {
            if file.version != FORMAT_VERSION {
                return Err(VaultError::CipherError(format!(
                    "unsupported credentials file version {}",
                    file.version
                )));
            }
            let key = file.kdf.derive(secret)?;
            let vault = Self {
                path,
                cipher,
                kdf: file.kdf,
                verifier: file.verifier,
                key,
                write_lock: Mutex::new(()),
            };
            vault
                .open_blob(&vault.verifier, VERIFIER_AAD)
                .map_err(|_| VaultError::BadPassphrase)?;
            debug!(path = %vault.path.display(), entries = file.entries.len(), "credentials file unlocked");
            return Ok(vault);
        }

        let kdf = KdfHeader::generate(params);
        let key = kdf.derive(secret)?;
        let mut vault = Self {
            path,
            cipher,
            kdf,
            verifier: String::new(),
            key,
            write_lock: Mutex::new(()),
        };
        vault.verifier = vault.seal_blob(VERIFIER_PLAINTEXT, VERIFIER_AAD)?;
        write_file(&vault.path, &vault.empty_file()).await?;
        info!(path = %vault.path.display(), "created credentials file");
        Ok(vault)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encrypt and persist `secret` under `reference`, replacing any
    /// previous value.
    pub async fn store(&self, reference: &str, secret: &SecretString) -> Result<(), VaultError> {
        if reference.trim().is_empty() {
            return Err(VaultError::InvalidReference(reference.to_string()));
        }
        let blob = self.seal_blob(secret.expose_secret().as_bytes(), reference.as_bytes())?;

        let _guard = self.write_lock.lock().await;
        let mut file = self.load_or_empty().await?;
        file.entries.insert(reference.to_string(), blob);
        write_file(&self.path, &file).await?;
        debug!(reference, "stored credential");
        Ok(())
    }

    /// Returns `true` if an entry was removed.
    pub async fn remove(&self, reference: &str) -> Result<bool, VaultError> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load_or_empty().await?;
        if file.entries.remove(reference).is_none() {
            return Ok(false);
        }
        write_file(&self.path, &file).await?;
        debug!(reference, "removed credential");
        Ok(true)
    }

    /// Stored references, sorted.
    pub async fn references(&self) -> Result<Vec<String>, VaultError> {
        Ok(self.load_or_empty().await?.entries.into_keys().collect())
    }

    fn empty_file(&self) -> VaultFile {
        VaultFile {
            version: FORMAT_VERSION,
            kdf: self.kdf.clone(),
            verifier: self.verifier.clone(),
            entries: BTreeMap::new(),
        }
    }

    async fn load_or_empty(&self) -> Result<VaultFile, VaultError> {
        match read_file(&self.path).await? {
            Some(file) => Ok(file),
            None => {
                warn!(path = %self.path.display(), "credentials file disappeared, recreating");
                Ok(self.empty_file())
            },
        }
    }

    fn seal_blob(&self, plaintext: &[u8], aad: &[u8]) -> Result<String, VaultError> {
        let sealed = self.cipher.encrypt(&self.key, plaintext, aad)?;
        let mut blob = Vec::with_capacity(1 + sealed.len());
        blob.push(self.cipher.version_tag());
        blob.extend_from_slice(&sealed);
        Ok(STANDARD.encode(blob))
    }

    fn open_blob(&self, b64: &str, aad: &[u8]) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let blob = STANDARD.decode(b64)?;
        match blob.split_first() {
            Some((tag, rest)) if *tag == self.cipher.version_tag() => {
                Ok(Zeroizing::new(self.cipher.decrypt(&self.key, rest, aad)?))
            },
            Some((tag, _)) => Err(VaultError::CipherError(format!(
                "unsupported cipher version tag {tag:#04x}"
            ))),
            None => Err(VaultError::CipherError("empty blob".to_string())),
        }
    }
}

#[async_trait]
impl<C: Cipher> CredentialVault for FileVault<C> {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn resolve(&self, reference: &str) -> Result<SecretString, VaultError> {
        let Some(file) = read_file(&self.path).await? else {
            return Err(VaultError::not_found(reference));
        };
        let Some(b64) = file.entries.get(reference) else {
            return Err(VaultError::not_found(reference));
        };
        let plain = self.open_blob(b64, reference.as_bytes())?;
        let value = std::str::from_utf8(&plain)
            .map_err(|e| VaultError::CipherError(format!("credential is not UTF-8: {e}")))?;
        if value.is_empty() {
            return Err(VaultError::not_found(reference));
        }
        Ok(SecretString::new(value.to_owned()))
    }
}

async fn read_file(path: &Path) -> Result<Option<VaultFile>, VaultError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write atomically via temp file + rename so readers never observe
/// partially-written JSON.
async fn write_file(path: &Path, file: &VaultFile) -> Result<(), VaultError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let data = serde_json::to_vec_pretty(file)?;

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("json.tmp.{nanos}"));
    tokio::fs::write(&temp_path, &data).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        warn!(
            temp_path = %temp_path.display(),
            path = %path.display(),
            error = %e,
            "failed to atomically replace credentials file"
        );
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}
