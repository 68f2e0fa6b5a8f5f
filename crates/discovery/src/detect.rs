//! Host-based provider detection.

use url::{Host, Url};

use crate::types::ProviderKind;

/// Hosts that serve the OpenAI `/v1/models` shape.
const OPENAI_STYLE_HOSTS: &[&str] = &[
    "api.openai.com",
    "api.groq.com",
    "api.together.xyz",
    "api.mistral.ai",
    "api.deepseek.com",
    "api.fireworks.ai",
];

type Predicate = fn(&Url) -> bool;

/// Evaluated in order; the first matching predicate decides.
const RULES: &[(Predicate, ProviderKind)] = &[
    (is_openrouter, ProviderKind::OpenRouter),
    (is_venice, ProviderKind::Venice),
    (is_known_openai_host, ProviderKind::OpenAiCompatible),
    (has_v1_segment, ProviderKind::OpenAiCompatible),
    (is_local_host, ProviderKind::OpenAiCompatible),
];

/// Guess the provider kind from a URL. Never returns [`ProviderKind::Unknown`].
pub fn detect(url: &Url) -> ProviderKind {
    RULES
        .iter()
        .find(|(matches, _)| matches(url))
        .map_or(ProviderKind::Generic, |(_, kind)| *kind)
}

/// Explicit kind wins unless it is `Unknown`, in which case detection decides.
pub fn resolve_kind(explicit: Option<ProviderKind>, url: &Url) -> ProviderKind {
    match explicit {
        Some(ProviderKind::Unknown) | None => detect(url),
        Some(kind) => kind,
    }
}

/// `localhost`, `*.localhost`, or a loopback address.
pub fn is_local_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        },
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

fn host_is(url: &Url, domain: &str) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == domain || host.strip_suffix(domain).is_some_and(|rest| rest.ends_with('.'))
}

fn is_openrouter(url: &Url) -> bool {
    host_is(url, "openrouter.ai")
}

fn is_venice(url: &Url) -> bool {
    host_is(url, "venice.ai")
}

fn is_known_openai_host(url: &Url) -> bool {
    host_is(url, "x.ai") || OPENAI_STYLE_HOSTS.iter().any(|h| host_is(url, h))
}

fn has_v1_segment(url: &Url) -> bool {
    url.path_segments()
        .is_some_and(|mut segments| segments.any(|s| s == "v1"))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn kind(url: &str) -> ProviderKind {
        detect(&Url::parse(url).unwrap())
    }

    #[test]
    fn known_hosts() {
        assert_eq!(kind("https://openrouter.ai"), ProviderKind::OpenRouter);
        assert_eq!(kind("https://openrouter.ai/api/v1"), ProviderKind::OpenRouter);
        assert_eq!(kind("https://api.venice.ai/api/v1"), ProviderKind::Venice);
        assert_eq!(kind("https://api.openai.com"), ProviderKind::OpenAiCompatible);
        assert_eq!(kind("https://api.x.ai"), ProviderKind::OpenAiCompatible);
        assert_eq!(kind("https://api.groq.com/openai"), ProviderKind::OpenAiCompatible);
    }

    #[test]
    fn suffix_must_be_a_label_boundary() {
        assert_eq!(kind("https://notopenrouter.ai"), ProviderKind::Generic);
        assert_eq!(kind("https://evilvenice.ai"), ProviderKind::Generic);
        assert_eq!(kind("https://eu.openrouter.ai"), ProviderKind::OpenRouter);
    }

    #[test]
    fn v1_path_is_openai_style() {
        assert_eq!(
            kind("https://llm.example.com/v1"),
            ProviderKind::OpenAiCompatible
        );
        assert_eq!(
            kind("https://llm.example.com/proxy/v1/"),
            ProviderKind::OpenAiCompatible
        );
        assert_eq!(kind("https://llm.example.com/v1beta"), ProviderKind::Generic);
    }

    #[test]
    fn local_servers_are_openai_style() {
        assert_eq!(kind("http://localhost:1234"), ProviderKind::OpenAiCompatible);
        assert_eq!(kind("http://127.0.0.1:11434"), ProviderKind::OpenAiCompatible);
        assert_eq!(kind("http://[::1]:8000"), ProviderKind::OpenAiCompatible);
        assert_eq!(kind("http://vllm.localhost"), ProviderKind::OpenAiCompatible);
    }

    #[test]
    fn everything_else_is_generic() {
        assert_eq!(kind("https://llm.example.com"), ProviderKind::Generic);
        assert_eq!(kind("https://10.0.0.5:8080/api"), ProviderKind::Generic);
    }

    #[test]
    fn explicit_kind_wins_unless_unknown() {
        let url = Url::parse("https://openrouter.ai").unwrap();
        assert_eq!(
            resolve_kind(Some(ProviderKind::Generic), &url),
            ProviderKind::Generic
        );
        assert_eq!(
            resolve_kind(Some(ProviderKind::Unknown), &url),
            ProviderKind::OpenRouter
        );
        assert_eq!(resolve_kind(None, &url), ProviderKind::OpenRouter);
    }
}
