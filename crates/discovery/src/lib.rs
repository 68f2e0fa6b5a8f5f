//! Provider discovery and model catalog.
//!
//! Given a [`ProviderProfile`] (base URL, credential reference, optional
//! provider kind and headers), [`DiscoveryService`] validates it, queries the
//! provider's model listing endpoint, normalizes whatever schema comes back
//! and keeps only chat-completion models. Results are cached per
//! (endpoint, credential) with a TTL, and concurrent requests for the same key
//! share a single network call.
//!
//! The stages are usable on their own:
//!
//! - [`sanitize`](sanitize::sanitize) validates and normalizes a profile.
//! - [`detect`](detect::detect) guesses a [`ProviderKind`] from a URL.
//! - [`parse`](parse::parse) turns a response body into [`ProviderModel`]s.
//! - [`ChatModelFilter`] drops embedding, audio, image and other non-chat models.
//! - [`CatalogCache`] stores catalogs ([`DiskCache`], [`MemoryCache`], [`NoCache`]).

pub mod cache;
pub mod detect;
pub mod error;
pub mod filter;
pub mod parse;
mod persist;
pub mod profiles;
pub mod sanitize;
pub mod service;
pub mod transport;
pub mod types;

pub use {
    cache::{CacheEntry, CacheError, CacheKey, CatalogCache, DiskCache, MemoryCache, NoCache},
    error::{DiscoveryError, ProfileError},
    filter::ChatModelFilter,
    profiles::{FileProfileStore, MemoryProfileStore, ProfileStore, ProfileStoreError},
    sanitize::NormalizedProfile,
    service::{DiscoveryService, DiscoveryServiceBuilder, ProfileSource},
    transport::{
        HttpTransport, ReqwestTransport, TransportError, TransportRequest, TransportResponse,
    },
    types::{
        ModelCatalog, ModelPricing, ModelTraits, ProviderKind, ProviderModel, ProviderProfile,
    },
};
