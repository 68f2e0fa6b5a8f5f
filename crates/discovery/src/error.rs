//! Error types for profile validation and model discovery.

use modelscout_vault::VaultError;

use crate::transport::TransportError;

/// Longest provider error body kept in [`DiscoveryError::ProviderStatus`].
pub const MAX_ERROR_BODY_CHARS: usize = 400;

/// A provider profile failed validation. No network call was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("profile name must not be empty")]
    EmptyName,

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// Errors from discovering a provider's model catalog.
///
/// `Clone` so a single in-flight fetch can hand the same outcome to every
/// waiting caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiscoveryError {
    /// The profile was rejected before any I/O.
    #[error("invalid profile: {0}")]
    InvalidProfile(#[from] ProfileError),

    /// No stored profile with this name.
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// The profile store could not be read.
    #[error("profile store error: {0}")]
    ProfileStore(String),

    /// The credential reference does not resolve to a secret.
    #[error("credential not found: {reference}")]
    CredentialNotFound { reference: String },

    /// The credential store failed (sealed, corrupt, unreadable).
    #[error("credential store error: {0}")]
    CredentialStore(String),

    /// Timeout, DNS, TLS or connection failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP 401 or 403.
    #[error("provider rejected the credential (HTTP {status})")]
    AuthRejected { status: u16 },

    /// HTTP 429.
    #[error("rate limited by provider{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// Any other non-2xx status.
    #[error("provider returned HTTP {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    /// The body could not be understood as a model list.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Discovery succeeded but no chat model survived filtering.
    #[error("no chat-capable models found")]
    EmptyCatalog,
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

impl DiscoveryError {
    /// Whether trying the same request later could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited { .. } => true,
            Self::ProviderStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// A short, user-facing suggestion for resolving the error.
    #[must_use]
    pub fn user_hint(&self) -> &'static str {
        match self {
            Self::InvalidProfile(ProfileError::EmptyName) => "Give the profile a name.",
            Self::InvalidProfile(ProfileError::InvalidBaseUrl(_)) => {
                "Use an https:// base URL (http:// is only allowed for localhost)."
            },
            Self::InvalidProfile(ProfileError::InvalidHeader { .. }) => {
                "Remove line breaks and special characters from custom headers."
            },
            Self::ProfileNotFound(_) => "Check the profile name or create the profile first.",
            Self::ProfileStore(_) => "Check that the profiles file is readable and valid JSON.",
            Self::CredentialNotFound { .. } => {
                "Store an API key for this profile or set the referenced environment variable."
            },
            Self::CredentialStore(_) => "Unlock the credential vault and try again.",
            Self::Transport(_) => "Check the base URL and your network connection.",
            Self::AuthRejected { .. } => "The API key was rejected; verify it is valid and active.",
            Self::RateLimited { .. } => "Wait a moment before refreshing the model list.",
            Self::ProviderStatus { status, .. } if *status >= 500 => {
                "The provider is having trouble; try again later."
            },
            Self::ProviderStatus { .. } => {
                "The provider refused the request; check the base URL and provider kind."
            },
            Self::MalformedResponse(_) => {
                "The endpoint did not return a model list; check the provider kind."
            },
            Self::EmptyCatalog => "The provider lists no chat models for this account.",
        }
    }

    /// Map a vault failure, keeping "not found" distinct from store failures.
    pub(crate) fn from_vault(error: VaultError, reference: &str) -> Self {
        match error {
            VaultError::NotFound { .. } => Self::CredentialNotFound {
                reference: reference.to_string(),
            },
            other => Self::CredentialStore(other.to_string()),
        }
    }
}

impl From<TransportError> for DiscoveryError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::TooLarge { limit } => {
                Self::MalformedResponse(format!("response body exceeds {limit} bytes"))
            },
            TransportError::NotUtf8 => {
                Self::MalformedResponse("response body is not valid UTF-8".into())
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Truncate a provider error body to [`MAX_ERROR_BODY_CHARS`] characters.
pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
