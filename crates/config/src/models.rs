use serde::Deserialize;

/// A single entry in `models.definitions`. Entries sharing a `name` form a
/// group the router picks among per `defaultStrategy`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    /// Client-visible model alias.
    pub name: String,
    /// Provider key this entry routes to (`openai`, `openrouter`, `vertex`, `anthropic`).
    pub provider: String,
    /// Concrete upstream model id, substituted for `name` before provider serialization.
    pub upstream_model: String,
    /// Selection weight among entries sharing `name`. Unused by the `first` strategy.
    #[serde(default)]
    pub weight: Option<u32>,
    /// Gates the pipeline's ensure-tool-call activation for requests routed to this entry.
    #[serde(default)]
    pub ensure_tool_call: bool,
    /// Per-model override merged onto the provider adapter's base config
    /// (apiKey/baseUrl/projectId/location/credentials/endpointOverride/...).
    #[serde(default, flatten)]
    pub overrides: toml::Table,
}

/// Strategy used to pick among model-definition entries that share a `name`.
/// Only `first` is implemented; the type stays open for future strategies.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    #[default]
    First,
}

/// `models.{definitions,defaultStrategy}`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ModelsConfig {
    pub definitions: Vec<ModelDefinition>,
    pub default_strategy: SelectionStrategy,
}
