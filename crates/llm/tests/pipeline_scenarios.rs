//! End-to-end pipeline scenarios (spec §8 S2, S3): drives
//! `PipelineController::handle` against a fake provider adapter so the
//! ensure-tool-call retry loop and the synthetic short-circuit can be
//! observed without a real upstream.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::http::HeaderMap;
use llm::{
    client::openai_chat::OpenAiChatAdapter,
    pipeline::PipelineController,
    provider::{ProviderAdapter, ProviderRegistry},
    router::ModelRouter,
    transform::{self, TransformDeps},
    uir::{ContentBlock, MessageStatus, OutputItem, ProviderResponse, Role, UirRequest, UirResponse},
};
use serde_json::{Value, json};
use toml::Table;

struct ScriptedProvider {
    calls: AtomicUsize,
    responses: Vec<Value>,
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn key(&self) -> &'static str {
        "fake"
    }

    async fn invoke(&self, _request: &UirRequest, _overrides: &Table) -> ProviderResponse {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self.responses.get(index).cloned().unwrap_or_else(|| self.responses.last().unwrap().clone());
        ProviderResponse { status: 200, headers: Default::default(), body, request_body: Some(json!({})) }
    }

    fn to_uir_response(&self, response: &ProviderResponse, request: &UirRequest) -> llm::Result<UirResponse> {
        let choice = response.body.get("choices").and_then(Value::as_array).and_then(|c| c.first()).unwrap();
        let message = choice.get("message").unwrap();

        let content = match message.get("content") {
            Some(Value::String(s)) if !s.is_empty() => vec![ContentBlock::text(s.clone())],
            _ => vec![],
        };

        let tool_calls = message.get("tool_calls").and_then(Value::as_array).map(|calls| {
            calls
                .iter()
                .map(|c| llm::uir::ToolCall {
                    id: c.get("id").and_then(Value::as_str).unwrap_or("call_1").to_owned(),
                    name: c.get("function").and_then(|f| f.get("name")).and_then(Value::as_str).unwrap_or_default().to_owned(),
                    arguments: c.get("function").and_then(|f| f.get("arguments")).and_then(Value::as_str).unwrap_or("{}").to_owned(),
                    extra: None,
                })
                .collect()
        });

        Ok(UirResponse {
            id: request.id.clone(),
            model: request.model.clone(),
            operation: request.operation,
            finish_reason: Some(if tool_calls.is_some() { "tool_calls".to_owned() } else { "stop".to_owned() }),
            output: vec![OutputItem::Message { role: Role::Assistant, content, tool_calls, status: MessageStatus::Completed }],
            usage: None,
            metadata: None,
            error: None,
        })
    }
}

fn router_with_ensure_tool_call() -> ModelRouter {
    let config = config::ModelsConfig {
        definitions: vec![toml::from_str("name = \"fake-model\"\nprovider = \"fake\"\nupstreamModel = \"fake-upstream\"\nensureToolCall = true\n").unwrap()],
        default_strategy: Default::default(),
    };
    ModelRouter::new(config)
}

fn controller(responses: Vec<Value>) -> PipelineController {
    let mut providers = ProviderRegistry::new();
    providers.register(Box::new(ScriptedProvider { calls: AtomicUsize::new(0), responses }));

    let (ingress, provider_stage, egress) = transform::build_registries();

    PipelineController::new(
        providers,
        router_with_ensure_tool_call(),
        ingress,
        provider_stage,
        egress,
        TransformDeps { signature_cache: Arc::new(llm::signature_cache::InMemorySignatureCache::default()) },
        None,
    )
}

fn request_body(messages: Vec<Value>) -> Value {
    json!({ "model": "fake-model", "messages": messages })
}

#[tokio::test]
async fn s2_ensure_tool_call_retries_then_accepts() {
    let responses = vec![
        json!({ "choices": [{ "finish_reason": null, "message": { "role": "assistant", "content": "Done" } }] }),
        json!({ "choices": [{ "finish_reason": "tool_calls", "message": { "role": "assistant", "content": null, "tool_calls": [
            { "id": "call_1", "type": "function", "function": { "name": "done", "arguments": "{\"final_answer\":\"All done\"}" } }
        ] } }] }),
    ];

    let controller = controller(responses);
    let adapter = OpenAiChatAdapter;
    let body = request_body(vec![json!({ "role": "user", "content": "Hello" })]);

    let rendered = controller.handle(&adapter, body, &HeaderMap::new()).await.unwrap();

    assert_eq!(rendered.pointer("/choices/0/message/content").and_then(Value::as_str), Some("All done"));
    assert!(rendered.pointer("/choices/0/message/tool_calls").is_none());
}

#[tokio::test]
async fn s3_synthetic_short_circuit_on_prior_no_tool_assistant() {
    // Never consulted: the ingress transform short-circuits before any invoke.
    let controller = controller(vec![json!({ "choices": [{ "message": { "role": "assistant", "content": "should not be seen" } }] })]);
    let adapter = OpenAiChatAdapter;

    let body = request_body(vec![
        json!({ "role": "user", "content": "Hello" }),
        json!({ "role": "assistant", "content": null, "tool_calls": [
            { "id": "call_0", "type": "function", "function": { "name": "search", "arguments": "{}" } }
        ] }),
        json!({ "role": "user", "content": "Follow up" }),
        json!({ "role": "assistant", "content": "I don't need tools" }),
    ]);

    let rendered = controller.handle(&adapter, body, &HeaderMap::new()).await.unwrap();

    assert_eq!(rendered.pointer("/choices/0/message/content"), Some(&Value::Null));
}
