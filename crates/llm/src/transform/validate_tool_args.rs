//! ValidateToolArgumentsTransform (provider, priority=90): every tool call's
//! `function.arguments` must be a JSON-parseable string. A malformed call is
//! not repaired here — that's `KimiResponseTransform`'s job, which runs
//! first — it just flags the attempt for retry (§4.5).

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::Result,
    transform::registry::{ProviderCtx, ProviderTransform, TransformDeps, is_synthetic_headers},
};

pub struct ValidateToolArgumentsTransform;

#[async_trait]
impl ProviderTransform for ValidateToolArgumentsTransform {
    fn name(&self) -> &'static str {
        "validate_tool_arguments"
    }

    fn priority(&self) -> i32 {
        90
    }

    fn applies(&self, ctx: &ProviderCtx<'_>) -> bool {
        !is_synthetic_headers(ctx.headers) && ctx.body.get("choices").is_some()
    }

    async fn transform(&self, ctx: &mut ProviderCtx<'_>, _deps: &TransformDeps) -> Result<()> {
        let Some(calls) = ctx.body.pointer("/choices/0/message/tool_calls").and_then(Value::as_array) else {
            return Ok(());
        };

        let all_valid = calls.iter().all(|call| {
            match call.get("function").and_then(|f| f.get("arguments")) {
                Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).is_ok(),
                _ => false,
            }
        });

        if !all_valid {
            ctx.request.state.retry_requested = true;
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

    use super::ValidateToolArgumentsTransform;

    fn request() -> UirRequest {
        UirRequest {
            id: "req_test".to_owned(),
            model: "m".to_owned(),
            operation: Operation::Chat,
            messages: vec![],
            tools: None,
            parameters: Parameters::default(),
            stream: false,
            state: Default::default(),
            metadata: Metadata::default(),
        }
    }

    #[tokio::test]
    async fn flags_retry_on_unparseable_arguments() {
        let transform = ValidateToolArgumentsTransform;
        let deps = TransformDeps { signature_cache: Arc::new(InMemorySignatureCache::default()) };
        let mut req = request();
        let headers = Default::default();

        let mut body = json!({
            "choices": [{ "message": { "tool_calls": [
                { "function": { "name": "f", "arguments": "{not json" } },
            ] } }],
        });

        {
            let mut ctx = ProviderCtx { body: &mut body, headers: &headers, request: &mut req };
            transform.transform(&mut ctx, &deps).await.unwrap();
        }

        assert!(req.state.retry_requested);
    }

    #[tokio::test]
    async fn accepts_valid_json_arguments() {
        let transform = ValidateToolArgumentsTransform;
        let deps = TransformDeps { signature_cache: Arc::new(InMemorySignatureCache::default()) };
        let mut req = request();
        let headers = Default::default();

        let mut body = json!({
            "choices": [{ "message": { "tool_calls": [
                { "function": { "name": "f", "arguments": "{\"a\":1}" } },
            ] } }],
        });

        {
            let mut ctx = ProviderCtx { body: &mut body, headers: &headers, request: &mut req };
            transform.transform(&mut ctx, &deps).await.unwrap();
        }

        assert!(!req.state.retry_requested);
    }
}
