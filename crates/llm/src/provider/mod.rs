//! Provider adapters (C3): serialize UIR to a provider's wire format,
//! invoke it, and normalize the raw response back into UIR.

pub mod anthropic;
pub mod http_client;
pub mod openai;
pub mod openrouter;
pub mod vertex;

use async_trait::async_trait;
use toml::Table;

use crate::{
    error::Result,
    uir::{ProviderResponse, UirRequest, UirResponse},
};

/// `invoke(request, config?) -> ProviderResponse` / `toUIRResponse(ProviderResponse, request) -> UIR-Response` (§4.2).
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier: `"openai"`, `"openrouter"`, `"vertex"`, `"anthropic"`.
    fn key(&self) -> &'static str;

    /// Builds the provider-native payload from `request`, merges `overrides`
    /// onto the adapter's base config, performs one HTTP call with a fixed
    /// upstream timeout, and captures both the request actually sent and the
    /// full response for logging — even on transport failure, in which case
    /// a synthetic `status >= 500` response carrying the error body is
    /// returned rather than propagating an error.
    async fn invoke(&self, request: &UirRequest, overrides: &Table) -> ProviderResponse;

    /// Converts a `ProviderResponse` whose body has already passed through
    /// the provider-stage transform chain into a `UIR-Response`.
    fn to_uir_response(&self, response: &ProviderResponse, request: &UirRequest) -> Result<UirResponse>;
}

/// Registry of configured provider adapters, keyed by `ProviderAdapter::key()`.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Box<dyn ProviderAdapter>) {
        self.providers.push(provider);
    }

    pub fn get(&self, key: &str) -> Option<&dyn ProviderAdapter> {
        self.providers.iter().find(|p| p.key() == key).map(AsRef::as_ref)
    }
}
