//! ClampMaxTokens (ingress, post-conversion): enforces invariant #4 — no
//! provider request body ever carries `max_tokens` above the configured cap.

use async_trait::async_trait;

use crate::{
    error::Result,
    transform::registry::{IngressCtx, IngressTransform, TransformDeps},
};

pub struct ClampMaxTokensTransform {
    pub cap: u32,
}

#[async_trait]
impl IngressTransform for ClampMaxTokensTransform {
    fn name(&self) -> &'static str {
        "clamp_max_tokens"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn applies(&self, ctx: &IngressCtx<'_>) -> bool {
        ctx.request.parameters.max_tokens.is_some_and(|tokens| tokens > self.cap)
    }

    async fn transform(&self, ctx: &mut IngressCtx<'_>, _deps: &TransformDeps) -> Result<()> {
        ctx.request.parameters.max_tokens = Some(self.cap);
        ctx.request.state.max_tokens_clamped = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        signature_cache::InMemorySignatureCache,
        transform::registry::{IngressCtx, IngressTransform, TransformDeps},
        uir::{Metadata, Operation, Parameters, UirRequest},
    };

    use super::ClampMaxTokensTransform;

    fn request(max_tokens: Option<u32>) -> UirRequest {
        UirRequest {
            id: "req_test".to_owned(),
            model: "m".to_owned(),
            operation: Operation::Chat,
            messages: vec![],
            tools: None,
            parameters: Parameters { max_tokens, ..Default::default() },
            stream: false,
            state: Default::default(),
            metadata: Metadata::default(),
        }
    }

    #[tokio::test]
    async fn clamps_above_cap() {
        let transform = ClampMaxTokensTransform { cap: 4096 };
        let deps = TransformDeps { signature_cache: Arc::new(InMemorySignatureCache::default()) };
        let mut req = request(Some(8000));

        {
            let mut ctx = IngressCtx { request: &mut req };
            assert!(transform.applies(&ctx));
            transform.transform(&mut ctx, &deps).await.unwrap();
        }

        assert_eq!(req.parameters.max_tokens, Some(4096));
        assert!(req.state.max_tokens_clamped);
    }

    #[tokio::test]
    async fn leaves_below_cap_untouched() {
        let transform = ClampMaxTokensTransform { cap: 4096 };
        let mut req = request(Some(1000));
        let ctx = IngressCtx { request: &mut req };
        assert!(!transform.applies(&ctx));
    }
}
