use secrecy::SecretString;
use serde::Deserialize;

/// `providers.openai` — OpenAI-compatible upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OpenAiProviderConfig {
    pub api_key: SecretString,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// `providers.openrouter` — thin OpenAI-compatible specialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OpenRouterProviderConfig {
    pub api_key: SecretString,
}

/// `providers.vertex` — Google Vertex MaaS.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct VertexProviderConfig {
    pub project_id: String,
    pub location: String,
    #[serde(default)]
    pub credentials: Option<SecretString>,
    #[serde(default)]
    pub credentials_path: Option<String>,
    #[serde(default)]
    pub endpoint_override: Option<String>,
}

/// `providers.anthropic` — native Anthropic Messages API.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AnthropicProviderConfig {
    pub api_key: SecretString,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// `providers.{openai,openrouter,vertex,anthropic}` — each an optional collaborator.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ProvidersConfig {
    pub openai: Option<OpenAiProviderConfig>,
    pub openrouter: Option<OpenRouterProviderConfig>,
    pub vertex: Option<VertexProviderConfig>,
    pub anthropic: Option<AnthropicProviderConfig>,
}
