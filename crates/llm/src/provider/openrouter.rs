//! OpenRouter: an OpenAI-compatible wire format over a different base URL.

use async_trait::async_trait;
use secrecy::{ExposeSecret as _, SecretString};
use toml::Table;

use crate::{
    error::Result,
    provider::{ProviderAdapter, http_client, openai},
    uir::{ProviderResponse, UirRequest, UirResponse},
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub struct OpenRouterProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenRouterProvider {
    pub fn new(api_key: SecretString) -> Self {
        Self { client: http_client::http_client(), base_url: DEFAULT_BASE_URL.to_owned(), api_key }
    }
}

#[async_trait]
impl ProviderAdapter for OpenRouterProvider {
    fn key(&self) -> &'static str {
        "openrouter"
    }

    async fn invoke(&self, request: &UirRequest, overrides: &Table) -> ProviderResponse {
        let body = openai::build_request_body(request);
        let base_url = overrides
            .get("base_url")
            .and_then(toml::Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| self.base_url.clone());
        let api_key = overrides
            .get("api_key")
            .and_then(toml::Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| self.api_key.expose_secret().to_owned());

        let url = format!("{base_url}/chat/completions");
        openai::send(&self.client, &url, &api_key, body).await
    }

    fn to_uir_response(&self, response: &ProviderResponse, request: &UirRequest) -> Result<UirResponse> {
        openai::normalize_response(&response.body, request)
    }
}
