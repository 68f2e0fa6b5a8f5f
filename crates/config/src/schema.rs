//! Config schema types (cache, timeouts, chat filter, vault, profiles).
use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelscoutConfig {
    pub cache: CacheConfig,
    pub timeouts: TimeoutConfig,
    pub filter: FilterConfig,
    pub discovery: DiscoverySettings,
    pub vault: VaultConfig,
    pub profiles: ProfilesConfig,
}

/// Catalog cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether discovered catalogs are cached at all. Defaults to true.
    pub enabled: bool,
    /// Directory for cache entries. Defaults to `<user cache dir>/model-cache`.
    pub dir: Option<PathBuf>,
    /// Seconds a fetched catalog stays fresh. Defaults to 300 (5 minutes).
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Bounds applied to a profile's `timeout_seconds`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Used by profiles that don't set their own timeout.
    pub default_secs: u64,
    pub min_secs: u64,
    pub max_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_secs: 60,
            min_secs: 1,
            max_secs: 120,
        }
    }
}

impl TimeoutConfig {
    /// Clamp `secs` into `[min_secs, max_secs]`.
    ///
    /// A misconfigured range (`min > max`) collapses to `max_secs`.
    #[must_use]
    pub fn clamp(&self, secs: u64) -> u64 {
        let min = self.min_secs.min(self.max_secs);
        secs.clamp(min, self.max_secs)
    }
}

/// What a matching filter rule does with a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    /// Drop the model from the chat catalog.
    Exclude,
    /// Keep the model, even if a later rule would exclude it.
    Include,
}

/// One `{pattern: action}` row of the chat-model filter table.
///
/// `pattern` is matched case-insensitively as a substring of the model id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub pattern: String,
    pub action: FilterAction,
}

impl FilterRule {
    pub fn exclude(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            action: FilterAction::Exclude,
        }
    }

    pub fn include(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            action: FilterAction::Include,
        }
    }
}

/// Patterns for model families that are not chat-completion models.
const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    // Embeddings and retrieval
    "embedding",
    "embed",
    "rerank",
    // Speech in / speech out
    "whisper",
    "transcribe",
    "tts",
    "speech",
    "audio",
    "asr",
    "realtime",
    // Image / video generation
    "dall-e",
    "gpt-image",
    "image",
    "stable-diffusion",
    "flux",
    "inpaint",
    "upscale",
    "cogview",
    "cogvideo",
    "video",
    "sora",
    "vision-only",
    // Everything else that isn't text generation
    "moderation",
    "ocr",
    "tokenizer",
];

/// The built-in filter table. Rules are evaluated in order; first match wins.
#[must_use]
pub fn default_filter_rules() -> Vec<FilterRule> {
    DEFAULT_EXCLUDE_PATTERNS
        .iter()
        .map(|p| FilterRule::exclude(*p))
        .collect()
}

/// Chat-model filter configuration.
///
/// A user-supplied `rules` list replaces the built-in table entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub rules: Vec<FilterRule>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            rules: default_filter_rules(),
        }
    }
}

/// Behaviour knobs for the discovery service itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Report a catalog with zero chat models as an error instead of an
    /// empty result. Defaults to false.
    pub empty_catalog_is_error: bool,
    /// Upper bound for a `/models` response body. Defaults to 10 MiB.
    pub max_response_bytes: usize,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            empty_catalog_is_error: false,
            max_response_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Which secret store backs credential references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultBackend {
    /// Resolve `env:NAME` / `NAME` references from the process environment.
    #[default]
    Env,
    /// Encrypted credentials file unlocked with a passphrase.
    File,
    /// Process-local store, empty at startup.
    Memory,
}

/// Credential vault configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub backend: VaultBackend,
    /// Credentials file for the `file` backend. Defaults to
    /// `<user data dir>/credentials.json`.
    pub path: Option<PathBuf>,
    /// Environment variable holding the passphrase for the `file` backend.
    pub passphrase_env: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            backend: VaultBackend::Env,
            path: None,
            passphrase_env: "MODELSCOUT_VAULT_PASSPHRASE".into(),
        }
    }
}

/// Provider profile store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilesConfig {
    /// Defaults to `<user data dir>/profiles.json`.
    pub path: Option<PathBuf>,
}
