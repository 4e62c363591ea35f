//! Native Anthropic Messages provider.

use async_trait::async_trait;
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::{Value, json};
use toml::Table;

use crate::{
    client::anthropic_messages::signature_placeholder,
    error::{LlmError, Result},
    provider::{ProviderAdapter, http_client},
    uir::{ContentBlock, MessageStatus, OutputItem, ProviderResponse, Role, ToolCall, UirRequest, UirResponse, Usage},
};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl AnthropicProvider {
    pub fn new(api_key: SecretString, base_url: Option<String>) -> Self {
        Self {
            client: http_client::http_client(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            api_key,
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn key(&self) -> &'static str {
        "anthropic"
    }

    async fn invoke(&self, request: &UirRequest, overrides: &Table) -> ProviderResponse {
        let body = build_request_body(request);
        let base_url = overrides
            .get("base_url")
            .and_then(toml::Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| self.base_url.clone());
        let api_key = overrides
            .get("api_key")
            .and_then(toml::Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| self.api_key.expose_secret().to_owned());

        let request_body = body.clone();
        let url = format!("{base_url}/messages");

        let result = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let headers = resp
                    .headers()
                    .iter()
                    .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
                    .collect();
                let text = resp.text().await.unwrap_or_default();
                let body: Value = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }));

                ProviderResponse { status, headers, body, request_body: Some(request_body) }
            }
            Err(err) => ProviderResponse {
                status: 502,
                headers: Default::default(),
                body: json!({ "type": "error", "error": { "type": "connection_error", "message": err.to_string() } }),
                request_body: Some(request_body),
            },
        }
    }

    fn to_uir_response(&self, response: &ProviderResponse, request: &UirRequest) -> Result<UirResponse> {
        normalize_response(&response.body, request)
    }
}

fn build_request_body(request: &UirRequest) -> Value {
    let system: String = request
        .messages
        .iter()
        .filter(|m| matches!(m.role, Role::System))
        .flat_map(|m| m.content.iter().filter_map(ContentBlock::as_text))
        .collect::<Vec<_>>()
        .join("\n");

    let messages: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| !matches!(m.role, Role::System))
        .map(|m| {
            let mut blocks = Vec::new();

            for block in &m.content {
                if let Some(text) = block.as_text() {
                    if !text.is_empty() {
                        blocks.push(json!({ "type": "text", "text": text }));
                    }
                }
            }

            if let Some(calls) = &m.tool_calls {
                for call in calls {
                    let input: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
                    blocks.push(json!({ "type": "tool_use", "id": call.id, "name": call.name, "input": input }));
                }
            }

            if matches!(m.role, Role::Tool) {
                let text: String = m.content.iter().filter_map(ContentBlock::as_text).collect();
                return json!({
                    "role": "user",
                    "content": [{ "type": "tool_result", "tool_use_id": m.tool_call_id, "content": text }],
                });
            }

            json!({
                "role": if matches!(m.role, Role::Assistant) { "assistant" } else { "user" },
                "content": blocks,
            })
        })
        .collect();

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request.parameters.max_tokens.unwrap_or(4096),
        "stream": false,
    });

    if !system.is_empty() {
        body["system"] = json!(system);
    }
    if let Some(t) = request.parameters.temperature {
        body["temperature"] = json!(t);
    }
    if let Some(t) = request.parameters.top_p {
        body["top_p"] = json!(t);
    }
    if let Some(t) = request.parameters.top_k {
        body["top_k"] = json!(t);
    }

    if let Some(tools) = &request.tools {
        body["tools"] = json!(
            tools
                .iter()
                .map(|t| json!({ "name": t.name, "description": t.description, "input_schema": t.parameters }))
                .collect::<Vec<_>>()
        );
    }

    body
}

fn normalize_response(body: &Value, request: &UirRequest) -> Result<UirResponse> {
    if body.get("type").and_then(Value::as_str) == Some("error") {
        let message = body
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("unknown provider error")
            .to_owned();
        return Err(LlmError::InvalidResponse(message));
    }

    let content = body.get("content").and_then(Value::as_array).ok_or_else(|| {
        LlmError::InvalidResponse("missing `content`".into())
    })?;

    let mut reasoning = Vec::new();
    let mut text_blocks = Vec::new();
    let mut tool_calls = Vec::new();

    for block in content {
        match block.get("type").and_then(Value::as_str) {
            Some("thinking") => {
                let text = block.get("thinking").and_then(Value::as_str).unwrap_or_default().to_owned();
                let signature = block.get("signature").and_then(Value::as_str).map(str::to_owned).unwrap_or_else(signature_placeholder);
                reasoning.push(ContentBlock::Reasoning { text, data: Some(json!({ "signature": signature })) });
            }
            Some("text") => {
                text_blocks.push(ContentBlock::text(block.get("text").and_then(Value::as_str).unwrap_or_default()));
            }
            Some("tool_use") => {
                tool_calls.push(ToolCall {
                    id: block.get("id").and_then(Value::as_str).unwrap_or_default().to_owned(),
                    name: block.get("name").and_then(Value::as_str).unwrap_or_default().to_owned(),
                    arguments: block.get("input").cloned().unwrap_or(Value::Null).to_string(),
                    extra: None,
                });
            }
            _ => {}
        }
    }

    let stop_reason = body.get("stop_reason").and_then(Value::as_str).unwrap_or("end_turn");
    let status = if stop_reason == "max_tokens" { MessageStatus::Incomplete } else { MessageStatus::Completed };

    let mut output = Vec::new();
    if !reasoning.is_empty() {
        output.push(OutputItem::Reasoning { content: reasoning, summary: vec![] });
    }
    output.push(OutputItem::Message {
        role: Role::Assistant,
        content: text_blocks,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        status,
    });

    let finish_reason = match stop_reason {
        "tool_use" => "tool_calls",
        "max_tokens" => "length",
        other => other,
    }
    .to_owned();

    let usage = body.get("usage").map(|u| Usage {
        input_tokens: u.get("input_tokens").and_then(Value::as_u64).map(|v| v as u32),
        output_tokens: u.get("output_tokens").and_then(Value::as_u64).map(|v| v as u32),
        total_tokens: None,
    });

    Ok(UirResponse {
        id: body.get("id").and_then(Value::as_str).map(str::to_owned).unwrap_or_else(|| request.id.clone()),
        model: body.get("model").and_then(Value::as_str).map(str::to_owned).unwrap_or_else(|| request.model.clone()),
        operation: request.operation,
        finish_reason: Some(finish_reason),
        output,
        usage,
        metadata: None,
        error: None,
    }
    .with_reasoning_first())
}
