//! Profiles, models and catalogs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which response schema a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// OpenAI `/v1/models` shape (OpenAI, xAI, Groq, LM Studio, vLLM, ...).
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
    #[serde(rename = "openrouter")]
    OpenRouter,
    /// Venice `model_spec` schema.
    #[serde(rename = "venice")]
    Venice,
    /// Unrecognized host: OpenAI shape or a flat list of ids.
    #[serde(rename = "generic")]
    Generic,
    /// Not chosen by the user; resolved by host detection.
    #[serde(rename = "unknown")]
    Unknown,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAiCompatible => "openai_compatible",
            Self::OpenRouter => "openrouter",
            Self::Venice => "venice",
            Self::Generic => "generic",
            Self::Unknown => "unknown",
        }
    }

    /// Path appended to a base URL that carries no API version.
    pub fn version_path(self) -> &'static str {
        match self {
            Self::OpenRouter | Self::Venice => "/api/v1",
            _ => "/v1",
        }
    }

    /// Endpoints that only ever list chat models skip the chat filter.
    pub fn lists_chat_only(self) -> bool {
        matches!(self, Self::Venice)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_timeout_seconds() -> u64 {
    60
}

/// A user-configured provider endpoint.
///
/// `credential_ref` names a secret in the credential vault; an empty string
/// means the endpoint needs no credential (local servers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub credential_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_kind: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl ProviderProfile {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            credential_ref: String::new(),
            provider_kind: None,
            headers: BTreeMap::new(),
            default_model: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }

    #[must_use]
    pub fn with_credential(mut self, reference: impl Into<String>) -> Self {
        self.credential_ref = reference.into();
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.provider_kind = Some(kind);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Capability flags reported (or inferred) for a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTraits {
    pub vision: bool,
    pub tools: bool,
    pub reasoning: bool,
    pub web_search: bool,
    pub response_schema: bool,
    pub logprobs: bool,
    pub code_optimized: bool,
}

/// USD per million tokens, when the provider publishes prices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPricing {
    pub input_usd_per_million: Option<f64>,
    pub output_usd_per_million: Option<f64>,
}

impl ModelPricing {
    pub fn is_known(&self) -> bool {
        self.input_usd_per_million.is_some() || self.output_usd_per_million.is_some()
    }
}

/// One model as listed by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderModel {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(default)]
    pub context_length: Option<u32>,
    #[serde(default)]
    pub traits: ModelTraits,
    #[serde(default)]
    pub pricing: ModelPricing,
    /// Modality the provider declared (`text`, `embedding`, `image`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
}

impl ProviderModel {
    /// A model known only by its id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            context_length: None,
            traits: ModelTraits::default(),
            pricing: ModelPricing::default(),
            model_type: None,
        }
    }
}

/// The chat models one provider endpoint offers at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub provider_kind: ProviderKind,
    /// Normalized base URL the catalog was fetched from.
    pub base_url: String,
    pub fetched_at_unix_s: u64,
    pub models: Vec<ProviderModel>,
}

impl ModelCatalog {
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ProviderModel> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.id.as_str())
    }
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
