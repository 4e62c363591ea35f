//! Configuration structures mapping the gateway's TOML configuration file.

#![deny(missing_docs)]

mod env;
mod error;
mod livestore;
mod loader;
mod logging;
mod models;
mod providers;
mod server;
mod streaming;

use std::path::Path;

pub use error::Error;
pub use livestore::LivestoreConfig;
pub use logging::LoggingConfig;
pub use models::{ModelDefinition, ModelsConfig, SelectionStrategy};
pub use providers::{
    AnthropicProviderConfig, OpenAiProviderConfig, OpenRouterProviderConfig, ProvidersConfig, VertexProviderConfig,
};
use serde::Deserialize;
pub use server::ServerConfig;
pub use streaming::StreamingConfig;

/// Top-level configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener configuration.
    pub server: ServerConfig,
    /// Persisted-log store configuration.
    pub logging: LoggingConfig,
    /// SSE streaming configuration.
    pub streaming: StreamingConfig,
    /// Mirrored client-visible view configuration.
    pub livestore: LivestoreConfig,
    /// Upstream provider configuration.
    pub providers: ProvidersConfig,
    /// Model alias routing table.
    pub models: ModelsConfig,
}

impl Config {
    /// Load configuration from a TOML file, expanding `$NAME` / `$NAME<suffix>`
    /// environment-variable references.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.streaming.chunk_size, 5);
        assert_eq!(config.livestore.batch_size, 50);
        assert!(config.models.definitions.is_empty());
        assert!(config.providers.openai.is_none());
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = toml::from_str::<Config>("nonsense = true").unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }
}
