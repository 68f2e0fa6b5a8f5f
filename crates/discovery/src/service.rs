//! Discovery orchestration: sanitize, cache lookup, credential, fetch, parse,
//! filter, store.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    futures::{
        FutureExt,
        future::{BoxFuture, Shared},
    },
    modelscout_config::{ModelscoutConfig, TimeoutConfig},
    modelscout_vault::CredentialVault,
    reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, USER_AGENT},
    secrecy::{ExposeSecret, SecretString},
    tracing::{debug, info, instrument, warn},
};

use crate::{
    cache::{CacheEntry, CacheKey, CatalogCache, DiskCache, MemoryCache, NoCache},
    error::{DiscoveryError, ProfileError, truncate_body},
    filter::ChatModelFilter,
    parse::parse,
    profiles::{FileProfileStore, ProfileStore},
    sanitize::{NormalizedProfile, sanitize_with},
    transport::{HttpTransport, ReqwestTransport, TransportRequest, TransportResponse},
    types::{ModelCatalog, ProviderProfile, unix_now},
};

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const CLIENT_USER_AGENT: &str = concat!("modelscout/", env!("CARGO_PKG_VERSION"));

type FetchOutcome = Result<Arc<ModelCatalog>, DiscoveryError>;
type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// A profile given inline or by its stored name.
#[derive(Debug, Clone)]
pub enum ProfileSource {
    Named(String),
    Inline(ProviderProfile),
}

impl From<&str> for ProfileSource {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<ProviderProfile> for ProfileSource {
    fn from(profile: ProviderProfile) -> Self {
        Self::Inline(profile)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    CacheFirst,
    Refresh,
}

struct Inner {
    vault: Arc<dyn CredentialVault>,
    cache: Arc<dyn CatalogCache>,
    transport: Arc<dyn HttpTransport>,
    profiles: Option<Arc<dyn ProfileStore>>,
    filter: ChatModelFilter,
    timeouts: TimeoutConfig,
    ttl: Duration,
    empty_catalog_is_error: bool,
    in_flight: Mutex<HashMap<CacheKey, SharedFetch>>,
}

/// Builds a [`DiscoveryService`]. Unset parts default to an in-memory cache
/// with a five minute TTL, the built-in chat filter and no profile store.
pub struct DiscoveryServiceBuilder {
    vault: Arc<dyn CredentialVault>,
    transport: Arc<dyn HttpTransport>,
    cache: Option<Arc<dyn CatalogCache>>,
    profiles: Option<Arc<dyn ProfileStore>>,
    filter: ChatModelFilter,
    timeouts: TimeoutConfig,
    ttl: Duration,
    empty_catalog_is_error: bool,
}

impl DiscoveryServiceBuilder {
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CatalogCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn profiles(mut self, profiles: Arc<dyn ProfileStore>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: ChatModelFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn empty_catalog_is_error(mut self, enabled: bool) -> Self {
        self.empty_catalog_is_error = enabled;
        self
    }

    pub fn build(self) -> DiscoveryService {
        DiscoveryService {
            inner: Arc::new(Inner {
                vault: self.vault,
                cache: self.cache.unwrap_or_else(|| Arc::new(MemoryCache::new())),
                transport: self.transport,
                profiles: self.profiles,
                filter: self.filter,
                timeouts: self.timeouts,
                ttl: self.ttl,
                empty_catalog_is_error: self.empty_catalog_is_error,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }
}

/// Turns provider profiles into chat-model catalogs.
///
/// Cheap to clone; clones share the cache and the in-flight table, so at most
/// one `/models` request per (endpoint, credential) is outstanding across all
/// of them. Concurrent callers for the same key await one shared outcome.
///
/// Failures never touch the cache and are never papered over with stale data.
#[derive(Clone)]
pub struct DiscoveryService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DiscoveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryService")
            .field("vault", &self.inner.vault.name())
            .field("ttl", &self.inner.ttl)
            .field("empty_catalog_is_error", &self.inner.empty_catalog_is_error)
            .finish_non_exhaustive()
    }
}

impl DiscoveryService {
    pub fn builder(
        vault: Arc<dyn CredentialVault>,
        transport: Arc<dyn HttpTransport>,
    ) -> DiscoveryServiceBuilder {
        DiscoveryServiceBuilder {
            vault,
            transport,
            cache: None,
            profiles: None,
            filter: ChatModelFilter::default(),
            timeouts: TimeoutConfig::default(),
            ttl: DEFAULT_TTL,
            empty_catalog_is_error: false,
        }
    }

    /// Wire up the production stack described by `config`: the configured
    /// vault, a disk cache (or none), the profiles file and a reqwest transport.
    pub async fn from_config(config: &ModelscoutConfig) -> Result<Self, DiscoveryError> {
        let vault = modelscout_vault::open_vault(&config.vault)
            .await
            .map_err(|e| DiscoveryError::CredentialStore(e.to_string()))?;

        let cache: Arc<dyn CatalogCache> = if config.cache.enabled {
            let dir = config
                .cache
                .dir
                .clone()
                .unwrap_or_else(DiskCache::default_dir);
            debug!(path = %dir.display(), "using disk catalog cache");
            Arc::new(DiskCache::new(dir))
        } else {
            debug!("catalog cache disabled");
            Arc::new(NoCache)
        };

        let profiles_path = config
            .profiles
            .path
            .clone()
            .unwrap_or_else(FileProfileStore::default_path);
        let transport = ReqwestTransport::new(config.discovery.max_response_bytes);

        Ok(Self::builder(vault, Arc::new(transport))
            .cache(cache)
            .profiles(Arc::new(FileProfileStore::new(profiles_path)))
            .filter(ChatModelFilter::from_config(&config.filter))
            .timeouts(config.timeouts.clone())
            .ttl(config.cache.ttl())
            .empty_catalog_is_error(config.discovery.empty_catalog_is_error)
            .build())
    }

    /// The chat models `profile` offers, from cache when fresh.
    ///
    /// The profile timeout bounds this caller's whole wait on the shared
    /// fetch: credential lookup, the request and parsing. A caller that times
    /// out gets [`DiscoveryError::Transport`] while the fetch keeps running
    /// for other callers and still populates the cache if it succeeds.
    #[instrument(skip(self, profile), fields(profile = %profile.name))]
    pub async fn discover(&self, profile: &ProviderProfile) -> FetchOutcome {
        self.run(profile, FetchMode::CacheFirst).await
    }

    /// Like [`discover`](Self::discover) but ignores any cached entry. The
    /// fresh result replaces it. The timeout applies the same way.
    #[instrument(skip(self, profile), fields(profile = %profile.name))]
    pub async fn refresh(&self, profile: &ProviderProfile) -> FetchOutcome {
        self.run(profile, FetchMode::Refresh).await
    }

    /// Discover using the stored profile called `name`.
    #[instrument(skip(self))]
    pub async fn discover_named(&self, name: &str) -> FetchOutcome {
        let profile = self.lookup_profile(name).await?;
        self.run(&profile, FetchMode::CacheFirst).await
    }

    pub async fn discover_from(&self, source: impl Into<ProfileSource>) -> FetchOutcome {
        match source.into() {
            ProfileSource::Named(name) => self.discover_named(&name).await,
            ProfileSource::Inline(profile) => self.discover(&profile).await,
        }
    }

    /// Drop the cached catalog for `profile`. Returns whether one existed.
    pub async fn invalidate(&self, profile: &ProviderProfile) -> Result<bool, DiscoveryError> {
        let normalized = sanitize_with(profile, &self.inner.timeouts)?;
        let key = cache_key(&normalized);
        let removed = self.inner.cache.invalidate(&key).await;
        debug!(profile = %normalized.name, cache_key = %key.short(), removed, "invalidated cache entry");
        Ok(removed)
    }

    /// Drop every cached catalog. Returns how many were removed.
    pub async fn clear_cache(&self) -> usize {
        let removed = self.inner.cache.clear().await;
        info!(removed, "cleared catalog cache");
        removed
    }

    /// Live cache entries, for operator inspection.
    pub async fn cached_entries(&self) -> Vec<CacheEntry> {
        self.inner.cache.entries().await
    }

    /// The configured profile store, if any.
    pub fn profiles(&self) -> Option<&Arc<dyn ProfileStore>> {
        self.inner.profiles.as_ref()
    }

    async fn lookup_profile(&self, name: &str) -> Result<ProviderProfile, DiscoveryError> {
        let Some(store) = &self.inner.profiles else {
            return Err(DiscoveryError::ProfileStore(
                "no profile store configured".into(),
            ));
        };
        store
            .get(name)
            .await
            .map_err(|e| DiscoveryError::ProfileStore(e.to_string()))?
            .ok_or_else(|| DiscoveryError::ProfileNotFound(name.trim().to_string()))
    }

    async fn run(&self, profile: &ProviderProfile, mode: FetchMode) -> FetchOutcome {
        let normalized = sanitize_with(profile, &self.inner.timeouts).inspect_err(|e| {
            debug!(error = %e, "profile rejected");
        })?;
        let key = cache_key(&normalized);
        debug!(
            cache_key = %key.short(),
            provider_kind = %normalized.kind,
            ?mode,
            "profile sanitized"
        );

        if mode == FetchMode::CacheFirst
            && let Some(catalog) = self.inner.cache.get(&key).await
        {
            debug!(cache_key = %key.short(), model_count = catalog.len(), "cache hit");
            return Ok(Arc::new(catalog));
        }

        let timeout = normalized.timeout;
        let flight = self.join_or_start(key, normalized, mode);
        match tokio::time::timeout(timeout, flight).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "discovery timed out");
                Err(DiscoveryError::Transport(format!(
                    "request timed out after {}s",
                    timeout.as_secs()
                )))
            },
        }
    }

    /// Join the fetch already running for `key`, or start one.
    ///
    /// The fetch runs on its own task so a caller giving up does not cancel
    /// it; the task removes its own in-flight entry when done.
    fn join_or_start(
        &self,
        key: CacheKey,
        profile: NormalizedProfile,
        mode: FetchMode,
    ) -> SharedFetch {
        let mut in_flight = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = in_flight.get(&key) {
            debug!(cache_key = %key.short(), "joining in-flight discovery");
            return existing.clone();
        }

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let outcome = inner.fetch(&task_key, &profile, mode).await;
            inner
                .in_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&task_key);
            outcome
        });
        let shared = async move {
            handle.await.unwrap_or_else(|e| {
                Err(DiscoveryError::Transport(format!(
                    "discovery task failed: {e}"
                )))
            })
        }
        .boxed()
        .shared();
        in_flight.insert(key, shared.clone());
        shared
    }
}

impl Inner {
    async fn fetch(
        &self,
        key: &CacheKey,
        profile: &NormalizedProfile,
        mode: FetchMode,
    ) -> FetchOutcome {
        // A flight that finished just before this one started may have
        // filled the cache.
        if mode == FetchMode::CacheFirst
            && let Some(catalog) = self.cache.get(key).await
        {
            return Ok(Arc::new(catalog));
        }

        let secret = match &profile.credential_ref {
            Some(reference) => {
                debug!(profile = %profile.name, vault = self.vault.name(), "resolving credential");
                let secret = self
                    .vault
                    .resolve(reference)
                    .await
                    .map_err(|e| DiscoveryError::from_vault(e, reference))?;
                Some(secret)
            },
            None => None,
        };

        let request = TransportRequest {
            url: profile.models_url(),
            headers: build_headers(profile, secret.as_ref())?,
            timeout: profile.timeout,
        };
        debug!(
            profile = %profile.name,
            url = %request.url,
            provider_kind = %profile.kind,
            "fetching model list"
        );

        let result = match self.transport.get(request).await {
            Ok(response) => check_status(&response, secret.as_ref()).map(|()| response),
            Err(error) => Err(error.into()),
        };
        let response = result.inspect_err(|e| {
            warn!(
                profile = %profile.name,
                base_url = %profile.base_url,
                error = %e,
                "model discovery request failed"
            );
        })?;

        let parsed = parse(profile.kind, &response.body).inspect_err(|e| {
            warn!(profile = %profile.name, error = %e, "unreadable model list");
        })?;
        let total = parsed.len();
        let models = self.filter.filter(profile.kind, parsed);
        debug!(
            profile = %profile.name,
            total,
            model_count = models.len(),
            "filtered chat models"
        );

        if models.is_empty() && self.empty_catalog_is_error {
            return Err(DiscoveryError::EmptyCatalog);
        }

        let catalog = ModelCatalog {
            provider_kind: profile.kind,
            base_url: profile.base_url.clone(),
            fetched_at_unix_s: unix_now(),
            models,
        };
        self.cache.put(key, &catalog, self.ttl).await;
        info!(
            profile = %profile.name,
            base_url = %profile.base_url,
            provider_kind = %profile.kind,
            model_count = catalog.len(),
            cache_key = %key.short(),
            "discovered models"
        );
        Ok(Arc::new(catalog))
    }
}

fn cache_key(profile: &NormalizedProfile) -> CacheKey {
    CacheKey::new(&profile.base_url, profile.credential_ref.as_deref())
}

fn build_headers(
    profile: &NormalizedProfile,
    secret: Option<&SecretString>,
) -> Result<HeaderMap, DiscoveryError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    if let Some(secret) = secret {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", secret.expose_secret()))
            .map_err(|_| {
                DiscoveryError::CredentialStore(
                    "credential contains characters not allowed in a header".into(),
                )
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    for (name, value) in &profile.headers {
        let invalid = |reason: &str| ProfileError::InvalidHeader {
            name: name.clone(),
            reason: reason.to_string(),
        };
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid("invalid name"))?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid("invalid value"))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

fn check_status(
    response: &TransportResponse,
    secret: Option<&SecretString>,
) -> Result<(), DiscoveryError> {
    match response.status {
        200..=299 => Ok(()),
        status @ (401 | 403) => Err(DiscoveryError::AuthRejected { status }),
        429 => Err(DiscoveryError::RateLimited {
            retry_after_secs: response.retry_after.map(|d| d.as_secs()),
        }),
        status => Err(DiscoveryError::ProviderStatus {
            status,
            body: truncate_body(&redact(&response.body, secret)),
        }),
    }
}

/// Providers sometimes echo the key back in error bodies.
fn redact(body: &str, secret: Option<&SecretString>) -> String {
    match secret.map(|s| s.expose_secret().as_str()) {
        Some(secret) if !secret.is_empty() => body.replace(secret, "[REDACTED]"),
        _ => body.to_string(),
    }
}
