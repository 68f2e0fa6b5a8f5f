use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{ConfigError, Result},
    schema::ModelscoutConfig,
    validate::{Diagnostic, Severity, check_semantics, validate_toml_str},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "modelscout.toml",
    "modelscout.yaml",
    "modelscout.yml",
    "modelscout.json",
];

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "modelscout")
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<ModelscoutConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Load config from `path` and validate it.
///
/// Error diagnostics (unknown fields, inverted timeout range, empty filter
/// patterns, ...) reject the file; warnings are logged and the config is
/// returned.
pub fn load_validated(path: &Path) -> Result<ModelscoutConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    let config = parse_config(&raw, path)?;

    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");
    let diagnostics = if is_toml {
        validate_toml_str(&raw).diagnostics
    } else {
        check_semantics(&config)
    };
    report(path, &diagnostics)?;
    Ok(config)
}

fn report(path: &Path, diagnostics: &[Diagnostic]) -> Result<()> {
    let mut problems = Vec::new();
    for d in diagnostics {
        match d.severity {
            Severity::Error => problems.push(format!("{}: {}", d.path, d.message)),
            Severity::Warning => {
                warn!(path = %path.display(), field = %d.path, category = d.category, "{}", d.message);
            },
            Severity::Info => {
                debug!(path = %path.display(), field = %d.path, "{}", d.message);
            },
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            path: path.to_path_buf(),
            problems,
        })
    }
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./modelscout.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/modelscout/modelscout.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ModelscoutConfig::default()` if no config file is found or the
/// file fails to parse or validate.
pub fn discover_and_load() -> ModelscoutConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_validated(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    ModelscoutConfig::default()
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(dir) = config_dir() {
        for name in CONFIG_FILENAMES {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/modelscout/`).
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().to_path_buf())
}

/// Returns the user data directory, home of `profiles.json` and the
/// encrypted credentials file.
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.data_dir().to_path_buf())
}

/// Returns the user cache directory. Catalog entries live under
/// `model-cache/` inside it.
pub fn cache_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.cache_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<ModelscoutConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::schema::VaultBackend};

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelscout.toml");
        std::fs::write(
            &path,
            r#"
            [cache]
            ttl_secs = 60

            [vault]
            backend = "memory"
            "#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.cache.ttl_secs, 60);
        assert_eq!(cfg.vault.backend, VaultBackend::Memory);
        assert!(cfg.cache.enabled);
    }

    #[test]
    fn loads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelscout.yaml");
        std::fs::write(
            &path,
            "timeouts:\n  max_secs: 90\ndiscovery:\n  empty_catalog_is_error: true\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.timeouts.max_secs, 90);
        assert!(cfg.discovery.empty_catalog_is_error);
    }

    #[test]
    fn loads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelscout.json");
        std::fs::write(&path, r#"{"cache": {"enabled": false}}"#).unwrap();

        let cfg = load_config(&path).unwrap();
        assert!(!cfg.cache.enabled);
    }

    #[test]
    fn substitutes_env_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelscout.toml");
        std::fs::write(
            &path,
            "[vault]\npassphrase_env = \"${MODELSCOUT_TEST_LOADER_UNSET_VAR}\"\n",
        )
        .unwrap();

        // Unset variables are left as-is.
        let cfg = load_config(&path).unwrap();
        assert_eq!(
            cfg.vault.passphrase_env,
            "${MODELSCOUT_TEST_LOADER_UNSET_VAR}"
        );
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelscout.ini");
        std::fs::write(&path, "").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ref ext) if ext == "ini"));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn validated_load_rejects_semantic_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelscout.toml");
        std::fs::write(&path, "[timeouts]\nmin_secs = 30\nmax_secs = 10\n").unwrap();

        let err = load_validated(&path).unwrap_err();
        let ConfigError::Invalid { problems, .. } = &err else {
            panic!("expected Invalid, got {err:?}");
        };
        assert!(problems.iter().any(|p| p.starts_with("timeouts:")));
        // The unvalidated loader still accepts it.
        assert!(load_config(&path).is_ok());
    }

    #[test]
    fn validated_load_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelscout.toml");
        std::fs::write(&path, "[cache]\nttl_sec = 60\n").unwrap();

        let err = load_validated(&path).unwrap_err();
        assert!(err.to_string().contains("cache.ttl_sec"));
    }

    #[test]
    fn validated_load_checks_json_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelscout.json");
        std::fs::write(&path, r#"{"discovery": {"max_response_bytes": 0}}"#).unwrap();

        assert!(matches!(
            load_validated(&path),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn validated_load_accepts_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelscout.toml");
        std::fs::write(&path, "[cache]\nttl_secs = 0\n").unwrap();

        let cfg = load_validated(&path).unwrap();
        assert_eq!(cfg.cache.ttl_secs, 0);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelscout.toml");
        std::fs::write(&path, "[cache\nttl_secs = ").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }
}
