//! Configuration loading, validation, and env substitution for model discovery.
//!
//! Config files: `modelscout.toml`, `modelscout.yaml`, or `modelscout.json`
//! Searched in `./` then `~/.config/modelscout/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{ConfigError, Result},
    loader::{cache_dir, config_dir, data_dir, discover_and_load, load_config, load_validated},
    schema::{
        CacheConfig, DiscoverySettings, FilterAction, FilterConfig, FilterRule,
        ModelscoutConfig, ProfilesConfig, TimeoutConfig, VaultBackend, VaultConfig,
        default_filter_rules,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
