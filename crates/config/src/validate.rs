//! Configuration validation.
//!
//! Checks TOML syntax, flags unknown or misspelled fields, and reports
//! semantic problems (inverted timeout range, empty filter patterns, ...).

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use crate::schema::{ModelscoutConfig, VaultBackend};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// One of "syntax", "unknown-field", "type-error", "semantic", "file-ref".
    pub category: &'static str,
    /// Dotted path, e.g. "timeouts.max_secs"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Array(Box<KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Array, Leaf, Struct};

    let filter_rule = Struct(HashMap::from([("pattern", Leaf), ("action", Leaf)]));

    Struct(HashMap::from([
        (
            "cache",
            Struct(HashMap::from([
                ("enabled", Leaf),
                ("dir", Leaf),
                ("ttl_secs", Leaf),
            ])),
        ),
        (
            "timeouts",
            Struct(HashMap::from([
                ("default_secs", Leaf),
                ("min_secs", Leaf),
                ("max_secs", Leaf),
            ])),
        ),
        (
            "filter",
            Struct(HashMap::from([("rules", Array(Box::new(filter_rule)))])),
        ),
        (
            "discovery",
            Struct(HashMap::from([
                ("empty_catalog_is_error", Leaf),
                ("max_response_bytes", Leaf),
            ])),
        ),
        (
            "vault",
            Struct(HashMap::from([
                ("backend", Leaf),
                ("path", Leaf),
                ("passphrase_env", Leaf),
            ])),
        ),
        ("profiles", Struct(HashMap::from([("path", Leaf)]))),
    ]))
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate the config file at `path`, or the discovered one when `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(crate::loader::find_config_file);

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");

    let mut result = match std::fs::read_to_string(&actual_path) {
        Ok(content) if is_toml => validate_toml_str(&content),
        Ok(_) => match crate::loader::load_config(&actual_path) {
            Ok(config) => ValidationResult {
                diagnostics: check_semantics(&config),
                config_path: None,
            },
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic::new(
                    Severity::Error,
                    "syntax",
                    "",
                    e.to_string(),
                )],
                config_path: None,
            },
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate a TOML document without touching the filesystem.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("TOML syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&toml_value, &build_schema_map(), "", &mut diagnostics);

    match toml::from_str::<ModelscoutConfig>(toml_str) {
        Ok(config) => diagnostics.extend(check_semantics(&config)),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (value, schema) {
        (toml::Value::Table(table), KnownKeys::Struct(fields)) => {
            let known: Vec<&str> = fields.keys().copied().collect();
            for (key, child) in table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                if let Some(child_schema) = fields.get(key.as_str()) {
                    check_unknown_fields(child, child_schema, &path, diagnostics);
                    continue;
                }
                let message = match suggest(key, &known, 3) {
                    Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
                    None => "unknown field".to_string(),
                };
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "unknown-field",
                    path,
                    message,
                ));
            }
        },
        (toml::Value::Array(items), KnownKeys::Array(item_schema)) => {
            for (i, item) in items.iter().enumerate() {
                check_unknown_fields(item, item_schema, &format!("{prefix}[{i}]"), diagnostics);
            }
        },
        // Leaf or type mismatch; type errors surface during deserialization.
        _ => {},
    }
}

/// Semantic checks on an already-deserialized config.
#[must_use]
pub fn check_semantics(config: &ModelscoutConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    let t = &config.timeouts;
    if t.min_secs == 0 {
        out.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "timeouts.min_secs",
            "minimum timeout must be at least 1 second",
        ));
    }
    if t.min_secs > t.max_secs {
        out.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "timeouts",
            format!(
                "min_secs ({}) is greater than max_secs ({})",
                t.min_secs, t.max_secs
            ),
        ));
    } else if !(t.min_secs..=t.max_secs).contains(&t.default_secs) {
        out.push(Diagnostic::new(
            Severity::Warning,
            "semantic",
            "timeouts.default_secs",
            format!(
                "default timeout {}s is outside [{}, {}] and will be clamped",
                t.default_secs, t.min_secs, t.max_secs
            ),
        ));
    }

    if config.cache.enabled && config.cache.ttl_secs == 0 {
        out.push(Diagnostic::new(
            Severity::Warning,
            "semantic",
            "cache.ttl_secs",
            "ttl of 0 expires every entry immediately; set cache.enabled = false instead",
        ));
    }

    if config.discovery.max_response_bytes == 0 {
        out.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "discovery.max_response_bytes",
            "response size limit must be greater than zero",
        ));
    }

    let mut seen = HashSet::new();
    for (i, rule) in config.filter.rules.iter().enumerate() {
        let pattern = rule.pattern.trim().to_ascii_lowercase();
        if pattern.is_empty() {
            out.push(Diagnostic::new(
                Severity::Error,
                "semantic",
                format!("filter.rules[{i}].pattern"),
                "empty pattern matches every model",
            ));
        } else if !seen.insert(pattern) {
            out.push(Diagnostic::new(
                Severity::Warning,
                "semantic",
                format!("filter.rules[{i}].pattern"),
                format!(
                    "duplicate pattern \"{}\" is shadowed by an earlier rule",
                    rule.pattern
                ),
            ));
        }
    }

    if config.vault.backend == VaultBackend::File && config.vault.passphrase_env.trim().is_empty()
    {
        out.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "vault.passphrase_env",
            "file vault needs the name of the passphrase environment variable",
        ));
    }

    out
}
