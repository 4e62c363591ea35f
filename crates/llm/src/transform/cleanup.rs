//! CleanupExtraPropertiesTransform (provider, priority=200): drops
//! provider-internal scratch fields before they leak into the stored/rendered
//! response. Runs last — pure hygiene, nothing downstream depends on it.

use async_trait::async_trait;

use crate::{
    error::Result,
    transform::registry::{ProviderCtx, ProviderTransform, TransformDeps},
};

pub struct CleanupExtraPropertiesTransform;

#[async_trait]
impl ProviderTransform for CleanupExtraPropertiesTransform {
    fn name(&self) -> &'static str {
        "cleanup_extra_properties"
    }

    fn priority(&self) -> i32 {
        200
    }

    fn applies(&self, ctx: &ProviderCtx<'_>) -> bool {
        ctx.body.pointer("/usage/extra_properties").is_some()
    }

    async fn transform(&self, ctx: &mut ProviderCtx<'_>, _deps: &TransformDeps) -> Result<()> {
        if let Some(usage) = ctx.body.get_mut("usage").and_then(|u| u.as_object_mut()) {
            usage.remove("extra_properties");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::{
        signature_cache::InMemorySignatureCache,
        transform::registry::{ProviderCtx, ProviderTransform, TransformDeps},
        uir::{Metadata, Operation, Parameters, UirRequest},
    };

    use super::CleanupExtraPropertiesTransform;

    #[tokio::test]
    async fn removes_extra_properties() {
        let transform = CleanupExtraPropertiesTransform;
        let deps = TransformDeps { signature_cache: Arc::new(InMemorySignatureCache::default()) };
        let mut req = UirRequest {
            id: "req_test".to_owned(),
            model: "m".to_owned(),
            operation: Operation::Chat,
            messages: vec![],
            tools: None,
            parameters: Parameters::default(),
            stream: false,
            state: Default::default(),
            metadata: Metadata::default(),
        };
        let headers = Default::default();
        let mut body = json!({ "usage": { "total_tokens": 10, "extra_properties": { "x": 1 } } });

        {
            let mut ctx = ProviderCtx { body: &mut body, headers: &headers, request: &mut req };
            assert!(transform.applies(&ctx));
            transform.transform(&mut ctx, &deps).await.unwrap();
        }

        assert!(body["usage"].get("extra_properties").is_none());
        assert_eq!(body["usage"]["total_tokens"], 10);
    }
}
