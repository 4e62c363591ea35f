//! KimiResponseTransform (provider, priority=10): wraps the pure repair
//! logic in `crate::kimi_fixer` as a registry transform. Runs first among
//! provider-stage transforms so later ones (validate, ensure-tool-call) see
//! repaired tool names and extracted calls rather than raw Kimi quirks.

use async_trait::async_trait;

use crate::{
    error::Result,
    kimi_fixer,
    transform::registry::{ProviderCtx, ProviderTransform, TransformDeps, is_synthetic_headers},
};

pub struct KimiResponseTransform;

#[async_trait]
impl ProviderTransform for KimiResponseTransform {
    fn name(&self) -> &'static str {
        "kimi_response"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn applies(&self, ctx: &ProviderCtx<'_>) -> bool {
        !is_synthetic_headers(ctx.headers) && ctx.body.get("choices").is_some()
    }

    async fn transform(&self, ctx: &mut ProviderCtx<'_>, _deps: &TransformDeps) -> Result<()> {
        let tools = ctx.request.tools.clone().unwrap_or_default();
        kimi_fixer::fix(ctx.body, &tools);
        Ok(())
    }
}
