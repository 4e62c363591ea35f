//! Model router (C7): resolves a client-visible model alias to a provider
//! key, concrete upstream model id, and per-model overrides (§4.7).

use config::{ModelsConfig, SelectionStrategy};

use crate::error::{LlmError, Result};

pub struct ResolvedModel {
    pub provider_key: String,
    pub upstream_model: String,
    pub ensure_tool_call: bool,
    pub overrides: toml::Table,
}

pub struct ModelRouter {
    config: ModelsConfig,
}

impl ModelRouter {
    pub fn new(config: ModelsConfig) -> Self {
        Self { config }
    }

    /// Resolves `alias` among every `models.definitions` entry sharing that
    /// `name`, applying `models.defaultStrategy` among the group.
    pub fn resolve(&self, alias: &str) -> Result<ResolvedModel> {
        let mut candidates = self.config.definitions.iter().filter(|def| def.name == alias);

        let chosen = match self.config.default_strategy {
            SelectionStrategy::First => candidates.next(),
        };

        let chosen = chosen.ok_or_else(|| LlmError::ModelNotFound(alias.to_owned()))?;

        Ok(ResolvedModel {
            provider_key: chosen.provider.clone(),
            upstream_model: chosen.upstream_model.clone(),
            ensure_tool_call: chosen.ensure_tool_call,
            overrides: chosen.overrides.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use config::{ModelDefinition, ModelsConfig};

    use super::ModelRouter;

    fn definition(name: &str, provider: &str, upstream: &str) -> ModelDefinition {
        toml::from_str(&format!(
            "name = \"{name}\"\nprovider = \"{provider}\"\nupstreamModel = \"{upstream}\"\n",
        ))
        .unwrap()
    }

    #[test]
    fn resolves_first_matching_definition() {
        let router = ModelRouter::new(ModelsConfig {
            definitions: vec![definition("gpt-fast", "openai", "gpt-4o-mini"), definition("gpt-fast", "openrouter", "openai/gpt-4o-mini")],
            default_strategy: Default::default(),
        });

        let resolved = router.resolve("gpt-fast").unwrap();
        assert_eq!(resolved.provider_key, "openai");
        assert_eq!(resolved.upstream_model, "gpt-4o-mini");
    }

    #[test]
    fn unknown_alias_is_not_found() {
        let router = ModelRouter::new(ModelsConfig::default());
        assert!(router.resolve("missing").is_err());
    }
}
