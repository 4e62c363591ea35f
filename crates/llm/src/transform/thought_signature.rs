//! Google Gemini "thought signature" round-tripping (§4.5, §4.8). Gemini 3
//! requires the opaque `thought_signature` blob returned on a tool call to be
//! replayed back on the next turn's matching tool call, or reasoning breaks.
//! UIR has no native home for this, so it rides `ToolCall.extra` between the
//! two sides of this pair:
//!
//! * `ExtractThoughtSignaturesTransform` (provider, priority=50) pulls the
//!   signature off the raw response and stashes it in the cache.
//! * `RestoreThoughtSignaturesTransform` (ingress, priority=90) looks up the
//!   signature for each tool call id appearing in history and re-attaches it
//!   before the request goes out again.

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::Result,
    transform::registry::{IngressCtx, IngressTransform, ProviderCtx, ProviderTransform, TransformDeps, is_synthetic_headers},
    uir::Role,
};

fn applies_to_model(model: &str) -> bool {
    model.contains("gemini-3")
}

pub struct RestoreThoughtSignaturesTransform;

#[async_trait]
impl IngressTransform for RestoreThoughtSignaturesTransform {
    fn name(&self) -> &'static str {
        "restore_thought_signatures"
    }

    fn priority(&self) -> i32 {
        90
    }

    fn applies(&self, ctx: &IngressCtx<'_>) -> bool {
        applies_to_model(&ctx.request.model)
    }

    async fn transform(&self, ctx: &mut IngressCtx<'_>, deps: &TransformDeps) -> Result<()> {
        let ids: Vec<String> = ctx
            .request
            .messages
            .iter()
            .filter(|m| matches!(m.role, Role::Assistant))
            .filter_map(|m| m.tool_calls.as_ref())
            .flatten()
            .map(|call| call.id.clone())
            .collect();

        if ids.is_empty() {
            return Ok(());
        }

        let signatures = deps.signature_cache.batch_retrieve(&ids).await;
        if signatures.is_empty() {
            return Ok(());
        }

        for message in ctx.request.messages.iter_mut().filter(|m| matches!(m.role, Role::Assistant)) {
            let Some(calls) = message.tool_calls.as_mut() else { continue };
            for call in calls.iter_mut() {
                if let Some(signature) = signatures.get(&call.id) {
                    call.extra = Some(serde_json::json!({ "google": { "thought_signature": signature } }));
                }
            }
        }

        Ok(())
    }
}

pub struct ExtractThoughtSignaturesTransform;

#[async_trait]
impl ProviderTransform for ExtractThoughtSignaturesTransform {
    fn name(&self) -> &'static str {
        "extract_thought_signatures"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn applies(&self, ctx: &ProviderCtx<'_>) -> bool {
        applies_to_model(&ctx.request.model) && !is_synthetic_headers(ctx.headers) && ctx.body.get("choices").is_some()
    }

    async fn transform(&self, ctx: &mut ProviderCtx<'_>, deps: &TransformDeps) -> Result<()> {
        let Some(calls) = ctx.body.pointer("/choices/0/message/tool_calls").and_then(Value::as_array) else {
            return Ok(());
        };

        for call in calls {
            let Some(id) = call.get("id").and_then(Value::as_str) else { continue };
            let signature = call
                .get("extra_content")
                .and_then(|extra| extra.pointer("/google/thought_signature"))
                .and_then(Value::as_str);

            if let Some(signature) = signature {
                deps.signature_cache.store(id.to_owned(), signature.to_owned()).await;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::{
        signature_cache::{InMemorySignatureCache, SignatureCache},
        transform::registry::{IngressCtx, IngressTransform, ProviderCtx, ProviderTransform, TransformDeps},
        uir::{ContentBlock, Message, Metadata, Operation, Parameters, Role, ToolCall, UirRequest},
    };

    use super::{ExtractThoughtSignaturesTransform, RestoreThoughtSignaturesTransform};

    fn request(model: &str) -> UirRequest {
        UirRequest {
            id: "req_test".to_owned(),
            model: model.to_owned(),
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
    async fn extracts_and_restores_signature() {
        let cache = Arc::new(InMemorySignatureCache::default());
        let deps = TransformDeps { signature_cache: cache.clone() };

        let extract = ExtractThoughtSignaturesTransform;
        let mut req = request("gemini-3-pro-preview");
        let headers = Default::default();
        let mut body = json!({
            "choices": [{ "message": { "tool_calls": [
                { "id": "call_1", "extra_content": { "google": { "thought_signature": "sig123" } } },
            ] } }],
        });

        {
            let mut ctx = ProviderCtx { body: &mut body, headers: &headers, request: &mut req };
            assert!(extract.applies(&ctx));
            extract.transform(&mut ctx, &deps).await.unwrap();
        }

        assert_eq!(cache.batch_retrieve(&["call_1".to_owned()]).await.get("call_1").unwrap(), "sig123");

        let restore = RestoreThoughtSignaturesTransform;
        let mut req2 = request("gemini-3-pro-preview");
        req2.messages.push(Message {
            role: Role::Assistant,
            content: vec![ContentBlock::text("")],
            tool_calls: Some(vec![ToolCall { id: "call_1".to_owned(), name: "f".to_owned(), arguments: "{}".to_owned(), extra: None }]),
            tool_call_id: None,
        });

        {
            let mut ctx = IngressCtx { request: &mut req2 };
            restore.transform(&mut ctx, &deps).await.unwrap();
        }

        let restored = &req2.messages[0].tool_calls.as_ref().unwrap()[0];
        assert_eq!(restored.extra.as_ref().unwrap()["google"]["thought_signature"], "sig123");
    }
}
