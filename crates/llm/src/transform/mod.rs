//! Transform stage registry and the concrete transforms registered into it
//! (§4.5). See `registry` for the shared trait/context machinery.

pub mod clamp_max_tokens;
pub mod cleanup;
pub mod ensure_tool_call;
pub mod kimi;
pub mod registry;
pub mod thought_signature;
pub mod validate_tool_args;

pub use registry::{
    EgressCtx, EgressRegistry, EgressTransform, IngressCtx, IngressRegistry, IngressTransform, ProviderCtx, ProviderRegistry,
    ProviderTransform, TransformDeps, is_synthetic_headers,
};

/// `MAX_TOKENS_CAP` env var (§6), default 4096.
pub fn max_tokens_cap() -> u32 {
    std::env::var("MAX_TOKENS_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(4096)
}

/// Builds the three stage registries from static defaults plus the
/// `MAX_TOKENS_CAP` env var.
pub fn build_registries() -> (IngressRegistry, ProviderRegistry, EgressRegistry) {
    let cap = max_tokens_cap();

    let ingress = IngressRegistry::new(vec![
        Box::new(clamp_max_tokens::ClampMaxTokensTransform { cap }),
        Box::new(thought_signature::RestoreThoughtSignaturesTransform),
        Box::new(ensure_tool_call::EnsureToolCallRequestTransform),
    ]);

    let provider = ProviderRegistry::new(vec![
        Box::new(kimi::KimiResponseTransform),
        Box::new(thought_signature::ExtractThoughtSignaturesTransform),
        Box::new(validate_tool_args::ValidateToolArgumentsTransform),
        Box::new(ensure_tool_call::EnsureToolCallResponseTransform {
            config: ensure_tool_call::EnsureToolCallConfig::default(),
        }),
        Box::new(cleanup::CleanupExtraPropertiesTransform),
    ]);

    let egress = EgressRegistry::new(vec![]);

    (ingress, provider, egress)
}
