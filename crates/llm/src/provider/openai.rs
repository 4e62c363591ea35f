//! OpenAI-compatible wire format: shared by the native OpenAI adapter and
//! reused (with different transport/auth) by OpenRouter and Vertex MaaS.

use async_trait::async_trait;
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::{Value, json};
use toml::Table;

use crate::{
    error::{LlmError, Result},
    provider::{ProviderAdapter, http_client},
    uir::{ContentBlock, MessageStatus, OutputItem, ProviderResponse, Role, ToolCall, UirRequest, UirResponse, Usage},
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiProvider {
    pub fn new(api_key: SecretString, base_url: Option<String>) -> Self {
        Self {
            client: http_client::http_client(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            api_key,
        }
    }

    fn api_key_for(&self, overrides: &Table) -> String {
        overrides
            .get("api_key")
            .and_then(toml::Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| self.api_key.expose_secret().to_owned())
    }

    fn base_url_for(&self, overrides: &Table) -> String {
        overrides
            .get("base_url")
            .and_then(toml::Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| self.base_url.clone())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    fn key(&self) -> &'static str {
        "openai"
    }

    async fn invoke(&self, request: &UirRequest, overrides: &Table) -> ProviderResponse {
        let body = build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url_for(overrides));
        let api_key = self.api_key_for(overrides);

        send(&self.client, &url, &api_key, body).await
    }

    fn to_uir_response(&self, response: &ProviderResponse, request: &UirRequest) -> Result<UirResponse> {
        normalize_response(&response.body, request)
    }
}

pub(crate) async fn send(client: &reqwest::Client, url: &str, bearer_token: &str, body: Value) -> ProviderResponse {
    let request_body = body.clone();

    let result = client
        .post(url)
        .bearer_auth(bearer_token)
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
            body: json!({ "error": { "message": err.to_string(), "type": "connection_error" } }),
            request_body: Some(request_body),
        },
    }
}

/// Constructs the OpenAI-compatible chat-completions body from UIR.
pub fn build_request_body(request: &UirRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| {
            let text: String = m.content.iter().filter_map(ContentBlock::as_text).collect();
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };

            let mut obj = json!({ "role": role, "content": if text.is_empty() && m.tool_calls.is_some() { Value::Null } else { json!(text) } });

            if let Some(calls) = &m.tool_calls {
                obj["tool_calls"] = json!(
                    calls
                        .iter()
                        .map(|c| {
                            let mut call = json!({
                                "id": c.id,
                                "type": "function",
                                "function": { "name": c.name, "arguments": c.arguments },
                            });
                            if let Some(extra) = &c.extra {
                                call["extra_content"] = extra.clone();
                            }
                            call
                        })
                        .collect::<Vec<_>>()
                );
            }

            if let Some(id) = &m.tool_call_id {
                obj["tool_call_id"] = json!(id);
            }

            obj
        })
        .collect();

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "stream": false,
    });

    if let Some(t) = request.parameters.temperature {
        body["temperature"] = json!(t);
    }
    if let Some(t) = request.parameters.top_p {
        body["top_p"] = json!(t);
    }
    if let Some(t) = request.parameters.max_tokens {
        body["max_tokens"] = json!(t);
    }

    if let Some(tools) = &request.tools {
        body["tools"] = json!(
            tools
                .iter()
                .map(|t| json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                        "strict": t.strict,
                    },
                }))
                .collect::<Vec<_>>()
        );
    }

    body
}

/// The "OpenAI-compatible normalization (shared)" pass of §4.2: tolerant of
/// `content: null`, numeric-or-string tool-call names (left as the Kimi
/// fixer's job upstream of this call), `reasoning_content` as string or
/// array of `{thinking|text, signature?}`.
pub fn normalize_response(body: &Value, request: &UirRequest) -> Result<UirResponse> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| LlmError::InvalidResponse("missing `choices[0]`".into()))?;

    let message = choice.get("message").cloned().unwrap_or(Value::Null);

    let content_text = match message.get("content") {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };

    let reasoning_text = reasoning_content_to_text(message.get("reasoning_content"));

    let tool_calls: Vec<ToolCall> = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .enumerate()
                .map(|(i, call)| {
                    let id = call
                        .get("id")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_owned)
                        .unwrap_or_else(|| format!("call_synth_{i}"));

                    let function = call.get("function").cloned().unwrap_or(Value::Null);
                    let name = match function.get("name") {
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                        None => String::new(),
                    };
                    let arguments = match function.get("arguments") {
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                        None => "{}".to_owned(),
                    };

                    ToolCall { id, name, arguments, extra: None }
                })
                .collect()
        })
        .unwrap_or_default();

    let status = if choice.get("finish_reason").and_then(Value::as_str) == Some("length") {
        MessageStatus::Incomplete
    } else {
        MessageStatus::Completed
    };

    let mut output = Vec::new();

    if !reasoning_text.is_empty() {
        output.push(OutputItem::Reasoning {
            content: vec![ContentBlock::Reasoning { text: reasoning_text, data: None }],
            summary: vec![],
        });
    }

    output.push(OutputItem::Message {
        role: Role::Assistant,
        content: if content_text.is_empty() { vec![] } else { vec![ContentBlock::text(content_text)] },
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls.clone()) },
        status,
    });

    let finish_reason = choice
        .get("finish_reason")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .filter(|s| !s.is_empty())
        .or_else(|| (!tool_calls.is_empty()).then(|| "tool_calls".to_owned()))
        .unwrap_or_else(|| "stop".to_owned());

    let usage = body.get("usage").map(|u| Usage {
        input_tokens: u.get("prompt_tokens").and_then(Value::as_u64).map(|v| v as u32),
        output_tokens: u.get("completion_tokens").and_then(Value::as_u64).map(|v| v as u32),
        total_tokens: u.get("total_tokens").and_then(Value::as_u64).map(|v| v as u32),
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

fn reasoning_content_to_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.get("thinking").or_else(|| i.get("text")).and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::normalize_response;
    use crate::uir::{Metadata, Operation, Parameters, UirRequest};

    fn request() -> UirRequest {
        UirRequest {
            id: "req_1".to_owned(),
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

    #[test]
    fn normalizes_null_content_with_tool_call() {
        let body = json!({
            "id": "chatcmpl-123",
            "model": "m",
            "choices": [{
                "finish_reason": null,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "reasoning_content": null,
                    "tool_calls": [{ "id": "call_1", "type": "function", "function": { "name": "search", "arguments": { "query": "docs" } } }],
                },
            }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3 },
        });

        let response = normalize_response(&body, &request()).unwrap();

        assert_eq!(response.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(response.output.len(), 1);

        match &response.output[0] {
            crate::uir::OutputItem::Message { content, tool_calls, .. } => {
                assert!(content.is_empty());
                let calls = tool_calls.as_ref().unwrap();
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[0].name, "search");
                assert_eq!(calls[0].arguments, json!({ "query": "docs" }).to_string());
            }
            other => panic!("expected a Message output item, got {other:?}"),
        }

        let usage = response.usage.unwrap();
        assert_eq!(usage.input_tokens, Some(1));
        assert_eq!(usage.output_tokens, Some(2));
        assert_eq!(usage.total_tokens, Some(3));
    }
}
