//! TTL cache for discovered catalogs.
//!
//! Entries are keyed by the normalized base URL plus a SHA-256 digest of the
//! credential reference. Neither the secret nor the reference itself is ever
//! written to disk.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    sha2::{Digest, Sha256},
    tokio::sync::{Mutex, RwLock},
    tracing::{debug, warn},
};

use crate::{
    persist::write_atomic,
    types::{ModelCatalog, unix_now},
};

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Identifies one (endpoint, credential) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub base_url: String,
    /// SHA-256 hex of the credential reference, `None` for keyless endpoints.
    pub credential_ref_hash: Option<String>,
}

impl CacheKey {
    pub fn new(base_url: impl Into<String>, credential_ref: Option<&str>) -> Self {
        Self {
            base_url: base_url.into(),
            credential_ref_hash: credential_ref.map(sha256_hex),
        }
    }

    /// Stable digest of the whole key, used as the on-disk file name.
    pub fn digest(&self) -> String {
        let cred = self.credential_ref_hash.as_deref().unwrap_or("-");
        sha256_hex(&format!("{}\n{cred}", self.base_url))
    }

    /// Short form for log lines.
    pub fn short(&self) -> String {
        self.digest()[..12].to_string()
    }
}

/// A cached catalog and when it goes stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub catalog: ModelCatalog,
    pub expires_at_unix_s: u64,
}

impl CacheEntry {
    /// Expiry runs from when the catalog was fetched, not when it was stored.
    fn new(key: &CacheKey, catalog: &ModelCatalog, ttl: Duration) -> Self {
        Self {
            key: key.clone(),
            catalog: catalog.clone(),
            expires_at_unix_s: catalog
                .fetched_at_unix_s
                .saturating_add(ttl.as_secs().max(1)),
        }
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at_unix_s
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Catalog storage. Implementations never fail the caller: a broken store
/// behaves like an empty one.
#[async_trait]
pub trait CatalogCache: Send + Sync {
    /// The live entry for `key`. Expired entries are a miss.
    async fn get(&self, key: &CacheKey) -> Option<ModelCatalog>;

    /// Store `catalog` for `ttl`. A zero TTL stores nothing.
    async fn put(&self, key: &CacheKey, catalog: &ModelCatalog, ttl: Duration);

    /// Drop the entry for `key`, returning whether one existed.
    async fn invalidate(&self, key: &CacheKey) -> bool;

    /// Drop every entry, returning how many were removed.
    async fn clear(&self) -> usize;

    /// All live entries.
    async fn entries(&self) -> Vec<CacheEntry>;
}

// ── Disk ─────────────────────────────────────────────────────────────────────

/// One JSON file per key under a cache directory.
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<user cache dir>/model-cache`.
    pub fn default_dir() -> PathBuf {
        modelscout_config::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".modelscout-cache"))
            .join("model-cache")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.digest()))
    }

    async fn read_entry(path: &Path) -> Result<Option<CacheEntry>, CacheError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn evict(path: &Path) {
        if let Err(error) = tokio::fs::remove_file(path).await
            && error.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %error, "failed to evict cache entry");
        }
    }

    async fn entry_files(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return out,
            Err(error) => {
                warn!(path = %self.dir.display(), error = %error, "failed to list cache dir");
                return out;
            },
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                out.push(path);
            }
        }
        out
    }

    async fn get_at(&self, key: &CacheKey, now: u64) -> Option<ModelCatalog> {
        let _guard = self.lock.lock().await;
        let path = self.path_for(key);
        match Self::read_entry(&path).await {
            Ok(Some(entry)) if entry.key != *key => {
                warn!(key = %key.short(), "cache entry key mismatch, ignoring");
                None
            },
            Ok(Some(entry)) if entry.is_expired_at(now) => {
                debug!(key = %key.short(), "cache entry expired");
                Self::evict(&path).await;
                None
            },
            Ok(Some(entry)) => Some(entry.catalog),
            Ok(None) => None,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "discarding unreadable cache entry");
                Self::evict(&path).await;
                None
            },
        }
    }

    async fn put_at(&self, key: &CacheKey, catalog: &ModelCatalog, ttl: Duration, now: u64) {
        if ttl.is_zero() {
            return;
        }
        let entry = CacheEntry::new(key, catalog, ttl);
        if entry.is_expired_at(now) {
            debug!(key = %key.short(), "catalog already stale, not caching");
            return;
        }
        let data = match serde_json::to_vec_pretty(&entry) {
            Ok(data) => data,
            Err(error) => {
                warn!(error = %error, "failed to serialize cache entry");
                return;
            },
        };
        let _guard = self.lock.lock().await;
        let path = self.path_for(key);
        if write_atomic(&path, &data).await.is_ok() {
            debug!(key = %key.short(), models = catalog.len(), "cached catalog");
        }
    }

    async fn entries_at(&self, now: u64) -> Vec<CacheEntry> {
        let _guard = self.lock.lock().await;
        let mut out = Vec::new();
        for path in self.entry_files().await {
            match Self::read_entry(&path).await {
                Ok(Some(entry)) if !entry.is_expired_at(now) => out.push(entry),
                Ok(Some(_)) => Self::evict(&path).await,
                Ok(None) => {},
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "discarding unreadable cache entry");
                    Self::evict(&path).await;
                },
            }
        }
        out.sort_by(|a, b| a.key.base_url.cmp(&b.key.base_url));
        out
    }
}

#[async_trait]
impl CatalogCache for DiskCache {
    async fn get(&self, key: &CacheKey) -> Option<ModelCatalog> {
        self.get_at(key, unix_now()).await
    }

    async fn put(&self, key: &CacheKey, catalog: &ModelCatalog, ttl: Duration) {
        self.put_at(key, catalog, ttl, unix_now()).await;
    }

    async fn invalidate(&self, key: &CacheKey) -> bool {
        let _guard = self.lock.lock().await;
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "failed to invalidate cache entry");
                false
            },
        }
    }

    async fn clear(&self) -> usize {
        let _guard = self.lock.lock().await;
        let mut removed = 0;
        for path in self.entry_files().await {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "failed to remove cache entry");
                },
            }
        }
        removed
    }

    async fn entries(&self) -> Vec<CacheEntry> {
        self.entries_at(unix_now()).await
    }
}

// ── Memory ───────────────────────────────────────────────────────────────────

/// Process-local cache, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get_at(&self, key: &CacheKey, now: u64) -> Option<ModelCatalog> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired_at(now) => return Some(entry.catalog.clone()),
                Some(_) => {},
                None => return None,
            }
        }
        self.evict_if_expired(key, now).await;
        None
    }

    /// A fresh put may land between the read and write locks, so expiry is
    /// re-checked before removing.
    async fn evict_if_expired(&self, key: &CacheKey, now: u64) {
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
            entries.remove(key);
        }
    }

    async fn put_at(&self, key: &CacheKey, catalog: &ModelCatalog, ttl: Duration, now: u64) {
        if ttl.is_zero() {
            return;
        }
        let entry = CacheEntry::new(key, catalog, ttl);
        if entry.is_expired_at(now) {
            return;
        }
        self.entries.write().await.insert(key.clone(), entry);
    }

    async fn entries_at(&self, now: u64) -> Vec<CacheEntry> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let mut out: Vec<_> = entries.values().cloned().collect();
        out.sort_by(|a, b| a.key.base_url.cmp(&b.key.base_url));
        out
    }
}

#[async_trait]
impl CatalogCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<ModelCatalog> {
        self.get_at(key, unix_now()).await
    }

    async fn put(&self, key: &CacheKey, catalog: &ModelCatalog, ttl: Duration) {
        self.put_at(key, catalog, ttl, unix_now()).await;
    }

    async fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }

    async fn entries(&self) -> Vec<CacheEntry> {
        self.entries_at(unix_now()).await
    }
}

// ── Disabled ─────────────────────────────────────────────────────────────────

/// Used when caching is turned off: every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl CatalogCache for NoCache {
    async fn get(&self, _key: &CacheKey) -> Option<ModelCatalog> {
        None
    }

    async fn put(&self, _key: &CacheKey, _catalog: &ModelCatalog, _ttl: Duration) {}

    async fn invalidate(&self, _key: &CacheKey) -> bool {
        false
    }

    async fn clear(&self) -> usize {
        0
    }

    async fn entries(&self) -> Vec<CacheEntry> {
        Vec::new()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::{ProviderKind, ProviderModel},
    };

    const TTL: Duration = Duration::from_secs(300);

    fn catalog_at(fetched_at_unix_s: u64, base_url: &str, ids: &[&str]) -> ModelCatalog {
        ModelCatalog {
            provider_kind: ProviderKind::OpenAiCompatible,
            base_url: base_url.to_string(),
            fetched_at_unix_s,
            models: ids.iter().map(|id| ProviderModel::new(*id)).collect(),
        }
    }

    fn catalog(base_url: &str, ids: &[&str]) -> ModelCatalog {
        catalog_at(unix_now(), base_url, ids)
    }

    #[test]
    fn key_hashes_credential_reference() {
        let key = CacheKey::new("https://api.openai.com/v1", Some("env:OPENAI_API_KEY"));
        let hash = key.credential_ref_hash.as_deref().unwrap();
        assert_eq!(hash.len(), 64);
        assert!(!hash.contains("OPENAI"));
        assert_eq!(key.short().len(), 12);
    }

    #[test]
    fn keys_differ_by_credential() {
        let a = CacheKey::new("https://api.openai.com/v1", Some("env:A"));
        let b = CacheKey::new("https://api.openai.com/v1", Some("env:B"));
        let none = CacheKey::new("https://api.openai.com/v1", None);
        assert_ne!(a.digest(), b.digest());
        assert_ne!(a.digest(), none.digest());
        assert_eq!(a.digest(), a.clone().digest());
    }

    #[test]
    fn expiry_boundary() {
        let key = CacheKey::new("http://localhost:1234/v1", None);
        let entry = CacheEntry::new(&key, &catalog_at(100, "x", &[]), Duration::from_secs(10));
        assert!(!entry.is_expired_at(109));
        assert!(entry.is_expired_at(110));
    }

    #[tokio::test]
    async fn expiry_counts_from_fetch_time_not_store_time() {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskCache::new(dir.path());
        let memory = MemoryCache::new();
        let key = CacheKey::new("https://api.openai.com/v1", None);
        let fetched = catalog_at(1_000, "https://api.openai.com/v1", &["gpt-4o"]);

        disk.put_at(&key, &fetched, TTL, 1_100).await;
        memory.put_at(&key, &fetched, TTL, 1_100).await;
        let on_disk = disk.entries_at(1_100).await;
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk[0].expires_at_unix_s, 1_300);
        assert_eq!(memory.entries_at(1_100).await[0].expires_at_unix_s, 1_300);
        assert!(disk.get_at(&key, 1_300).await.is_none());
        assert!(memory.get_at(&key, 1_300).await.is_none());
    }

    #[tokio::test]
    async fn catalog_stale_on_arrival_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskCache::new(dir.path());
        let memory = MemoryCache::new();
        let key = CacheKey::new("https://api.openai.com/v1", None);
        let fetched = catalog_at(1_000, "https://api.openai.com/v1", &["gpt-4o"]);

        disk.put_at(&key, &fetched, TTL, 5_000).await;
        memory.put_at(&key, &fetched, TTL, 5_000).await;
        assert!(disk.entries_at(5_000).await.is_empty());
        assert!(memory.entries_at(5_000).await.is_empty());
    }

    #[tokio::test]
    async fn memory_eviction_spares_entry_replaced_after_stale_read() {
        let cache = MemoryCache::new();
        let key = CacheKey::new("https://api.openai.com/v1", None);
        cache
            .put_at(&key, &catalog_at(0, "a", &["old"]), Duration::from_secs(10), 0)
            .await;
        assert!(cache.get_at(&key, 20).await.is_none());

        // The stale read at t=20 is followed by a put fetched at t=15 before
        // the evicting write lock is taken.
        cache
            .put_at(&key, &catalog_at(15, "a", &["new"]), Duration::from_secs(10), 20)
            .await;
        cache.evict_if_expired(&key, 20).await;
        let kept = cache.get_at(&key, 20).await.unwrap();
        assert_eq!(kept.ids().collect::<Vec<_>>(), ["new"]);
    }

    #[tokio::test]
    async fn disk_round_trip_preserves_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::new("https://openrouter.ai/api/v1", Some("env:OR"));

        let mut model = ProviderModel::new("anthropic/claude-sonnet-4");
        model.display_name = "Claude Sonnet 4".into();
        model.context_length = Some(200_000);
        model.traits.vision = true;
        model.traits.tools = true;
        model.pricing.input_usd_per_million = Some(3.0);
        model.pricing.output_usd_per_million = Some(15.0);
        model.model_type = Some("text".into());
        let original = ModelCatalog {
            provider_kind: ProviderKind::OpenRouter,
            base_url: "https://openrouter.ai/api/v1".into(),
            fetched_at_unix_s: unix_now(),
            models: vec![model],
        };

        cache.put(&key, &original, TTL).await;
        let loaded = DiskCache::new(dir.path()).get(&key).await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn disk_file_never_contains_reference() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::new("https://api.openai.com/v1", Some("env:SUPER_SECRET_NAME"));
        cache.put(&key, &catalog("https://api.openai.com/v1", &["gpt-4o"]), TTL).await;

        let path = dir.path().join(format!("{}.json", key.digest()));
        let raw = std::fs::read_to_string(path).unwrap();
        assert!(!raw.contains("SUPER_SECRET_NAME"));
    }

    #[tokio::test]
    async fn disk_expired_entry_is_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::new("https://api.groq.com/openai/v1", None);
        cache
            .put_at(&key, &catalog_at(1_000, "g", &["llama"]), Duration::from_secs(60), 1_000)
            .await;

        assert!(cache.get_at(&key, 1_059).await.is_some());
        assert!(cache.get_at(&key, 1_060).await.is_none());
        assert!(!dir.path().join(format!("{}.json", key.digest())).exists());
    }

    #[tokio::test]
    async fn disk_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::new("https://api.mistral.ai/v1", None);
        let path = dir.path().join(format!("{}.json", key.digest()));
        std::fs::write(&path, "{not json").unwrap();

        assert!(cache.get(&key).await.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn disk_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("absent"));
        let key = CacheKey::new("https://api.openai.com/v1", None);
        assert!(cache.get(&key).await.is_none());
        assert!(cache.entries().await.is_empty());
        assert_eq!(cache.clear().await, 0);
        assert!(!cache.invalidate(&key).await);
    }

    #[tokio::test]
    async fn disk_invalidate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let a = CacheKey::new("https://a.example.com/v1", None);
        let b = CacheKey::new("https://b.example.com/v1", Some("env:B"));
        cache.put(&a, &catalog("https://a.example.com/v1", &["m"]), TTL).await;
        cache.put(&b, &catalog("https://b.example.com/v1", &["n"]), TTL).await;

        let listed: Vec<_> = cache.entries().await.into_iter().map(|e| e.key).collect();
        assert_eq!(listed, [a.clone(), b.clone()]);

        assert!(cache.invalidate(&a).await);
        assert!(!cache.invalidate(&a).await);
        assert_eq!(cache.clear().await, 1);
        assert!(cache.entries().await.is_empty());
    }

    #[tokio::test]
    async fn zero_ttl_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskCache::new(dir.path());
        let memory = MemoryCache::new();
        let key = CacheKey::new("https://api.openai.com/v1", None);
        let cat = catalog("https://api.openai.com/v1", &["gpt-4o"]);

        disk.put(&key, &cat, Duration::ZERO).await;
        memory.put(&key, &cat, Duration::ZERO).await;
        assert!(disk.get(&key).await.is_none());
        assert!(memory.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn memory_cache_expires_and_lists() {
        let cache = MemoryCache::new();
        let key = CacheKey::new("https://api.deepseek.com/v1", Some("env:DS"));
        cache
            .put_at(&key, &catalog_at(50, "d", &["deepseek-chat"]), Duration::from_secs(5), 50)
            .await;

        assert_eq!(cache.entries_at(54).await.len(), 1);
        assert!(cache.get_at(&key, 54).await.is_some());
        assert!(cache.get_at(&key, 55).await.is_none());
        assert!(cache.entries_at(55).await.is_empty());
    }

    #[tokio::test]
    async fn no_cache_always_misses() {
        let cache = NoCache;
        let key = CacheKey::new("https://api.openai.com/v1", None);
        cache.put(&key, &catalog("x", &["gpt-4o"]), TTL).await;
        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.clear().await, 0);
    }
}
