//! Persisted provider profiles.

use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::sync::{Mutex, RwLock},
    tracing::{debug, warn},
};

use crate::{persist::write_atomic, types::ProviderProfile};

#[derive(Debug, thiserror::Error)]
pub enum ProfileStoreError {
    #[error("profile store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("profile store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Named provider profiles. Names are matched after trimming whitespace.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<ProviderProfile>, ProfileStoreError>;

    /// All profiles in insertion order.
    async fn list(&self) -> Result<Vec<ProviderProfile>, ProfileStoreError>;

    /// Insert `profile`, replacing any profile with the same name in place.
    async fn upsert(&self, profile: ProviderProfile) -> Result<(), ProfileStoreError>;

    /// Returns whether a profile was removed.
    async fn remove(&self, name: &str) -> Result<bool, ProfileStoreError>;
}

fn same_name(profile: &ProviderProfile, name: &str) -> bool {
    profile.name.trim() == name.trim()
}

fn upsert_into(profiles: &mut Vec<ProviderProfile>, profile: ProviderProfile) {
    match profiles.iter_mut().find(|p| same_name(p, &profile.name)) {
        Some(existing) => *existing = profile,
        None => profiles.push(profile),
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    profiles: Vec<ProviderProfile>,
}

/// Profiles kept in a `profiles.json` file.
#[derive(Debug)]
pub struct FileProfileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<user data dir>/profiles.json`.
    pub fn default_path() -> PathBuf {
        modelscout_config::data_dir()
            .unwrap_or_else(|| PathBuf::from(".modelscout"))
            .join("profiles.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<ProviderProfile>, ProfileStoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                warn!(path = %self.path.display(), error = %error, "failed to read profiles file");
                return Err(error.into());
            },
        };
        let file: ProfilesFile = serde_json::from_slice(&bytes).map_err(|error| {
            warn!(path = %self.path.display(), error = %error, "failed to parse profiles file");
            error
        })?;
        Ok(file.profiles)
    }

    async fn save(&self, profiles: Vec<ProviderProfile>) -> Result<(), ProfileStoreError> {
        let count = profiles.len();
        let data = serde_json::to_vec_pretty(&ProfilesFile { profiles })?;
        write_atomic(&self.path, &data).await?;
        debug!(path = %self.path.display(), count, "saved profiles");
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn get(&self, name: &str) -> Result<Option<ProviderProfile>, ProfileStoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().find(|p| same_name(p, name)))
    }

    async fn list(&self) -> Result<Vec<ProviderProfile>, ProfileStoreError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn upsert(&self, profile: ProviderProfile) -> Result<(), ProfileStoreError> {
        let _guard = self.lock.lock().await;
        let mut profiles = self.load().await?;
        upsert_into(&mut profiles, profile);
        self.save(profiles).await
    }

    async fn remove(&self, name: &str) -> Result<bool, ProfileStoreError> {
        let _guard = self.lock.lock().await;
        let mut profiles = self.load().await?;
        let before = profiles.len();
        profiles.retain(|p| !same_name(p, name));
        if profiles.len() == before {
            return Ok(false);
        }
        self.save(profiles).await?;
        Ok(true)
    }
}

/// Process-local profile store.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<Vec<ProviderProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = ProviderProfile>) -> Self {
        let mut out = Vec::new();
        for profile in profiles {
            upsert_into(&mut out, profile);
        }
        Self {
            profiles: RwLock::new(out),
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, name: &str) -> Result<Option<ProviderProfile>, ProfileStoreError> {
        Ok(self
            .profiles
            .read()
            .await
            .iter()
            .find(|p| same_name(p, name))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<ProviderProfile>, ProfileStoreError> {
        Ok(self.profiles.read().await.clone())
    }

    async fn upsert(&self, profile: ProviderProfile) -> Result<(), ProfileStoreError> {
        upsert_into(&mut *self.profiles.write().await, profile);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool, ProfileStoreError> {
        let mut profiles = self.profiles.write().await;
        let before = profiles.len();
        profiles.retain(|p| !same_name(p, name));
        Ok(profiles.len() != before)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::types::ProviderKind};

    fn openai() -> ProviderProfile {
        ProviderProfile::new("openai", "https://api.openai.com")
            .with_credential("env:OPENAI_API_KEY")
    }

    fn local() -> ProviderProfile {
        ProviderProfile::new("lmstudio", "http://localhost:1234")
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let store = FileProfileStore::new(&path);
        store.upsert(openai()).await.unwrap();
        store.upsert(local()).await.unwrap();

        let reopened = FileProfileStore::new(&path);
        let names: Vec<_> = reopened
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["openai", "lmstudio"]);
        assert_eq!(reopened.get(" openai ").await.unwrap(), Some(openai()));
    }

    #[tokio::test]
    async fn file_store_upsert_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path().join("profiles.json"));
        store.upsert(openai()).await.unwrap();
        store.upsert(local()).await.unwrap();
        store
            .upsert(openai().with_kind(ProviderKind::OpenAiCompatible))
            .await
            .unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].provider_kind, Some(ProviderKind::OpenAiCompatible));
    }

    #[tokio::test]
    async fn file_store_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path().join("profiles.json"));
        store.upsert(openai()).await.unwrap();
        assert!(store.remove("openai").await.unwrap());
        assert!(!store.remove("openai").await.unwrap());
        assert!(store.get("openai").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path().join("nope").join("profiles.json"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.get("openai").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(&path, "[[[").unwrap();
        let store = FileProfileStore::new(&path);
        assert!(matches!(
            store.list().await.unwrap_err(),
            ProfileStoreError::Json(_)
        ));
    }

    #[tokio::test]
    async fn memory_store_basics() {
        let store = MemoryProfileStore::with_profiles([openai(), local()]);
        assert_eq!(store.list().await.unwrap().len(), 2);
        store.upsert(local().with_timeout(5)).await.unwrap();
        assert_eq!(
            store.get("lmstudio").await.unwrap().unwrap().timeout_seconds,
            5
        );
        assert!(store.remove("lmstudio").await.unwrap());
        assert_eq!(store.list().await.unwrap(), vec![openai()]);
    }
}
