//! Anthropic Messages dialect (`POST /v1/messages`).

use axum::http::HeaderMap;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    client::{ClientAdapter, generate_request_id},
    error::LlmError,
    error::Result,
    uir::{ContentBlock, Message, Metadata, Operation, OutputItem, Parameters, Role, Tool, ToolCall, UirRequest, UirResponse},
};

/// Deterministic placeholder used when no real Google thought-signature is
/// cached for a tool_call id (Design Note (c), open question).
pub const SIGNATURE_PLACEHOLDER_SOURCE: &str = "signature_placeholder";

pub fn signature_placeholder() -> String {
    base64::engine::general_purpose::STANDARD.encode(SIGNATURE_PLACEHOLDER_SOURCE)
}

pub struct AnthropicMessagesAdapter;

impl ClientAdapter for AnthropicMessagesAdapter {
    fn operation(&self) -> Operation {
        Operation::Messages
    }

    fn to_uir(&self, body: Value, headers: &HeaderMap) -> Result<UirRequest> {
        let model = body
            .get("model")
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::InvalidRequest("missing `model`".into()))?
            .to_owned();

        let mut messages = Vec::new();

        match body.get("system") {
            Some(Value::String(text)) => messages.push(Message::text(Role::System, text.clone())),
            Some(Value::Array(blocks)) => {
                let joined: String = blocks
                    .iter()
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n");
                if !joined.is_empty() {
                    messages.push(Message::text(Role::System, joined));
                }
            }
            _ => {}
        }

        for msg in body.get("messages").and_then(Value::as_array).unwrap_or(&Vec::new()) {
            messages.extend(message_to_uir(msg));
        }

        let tools = body.get("tools").and_then(Value::as_array).map(|tools| {
            tools.iter().filter_map(tool_to_uir).collect::<Vec<_>>()
        });

        Ok(UirRequest {
            id: generate_request_id(),
            model,
            operation: Operation::Messages,
            messages,
            tools,
            parameters: Parameters {
                temperature: body.get("temperature").and_then(Value::as_f64).map(|v| v as f32),
                top_p: body.get("top_p").and_then(Value::as_f64).map(|v| v as f32),
                top_k: body.get("top_k").and_then(Value::as_u64).map(|v| v as u32),
                max_tokens: body.get("max_tokens").and_then(Value::as_u64).map(|v| v as u32),
            },
            stream: body.get("stream").and_then(Value::as_bool).unwrap_or(false),
            state: Default::default(),
            metadata: Metadata {
                client_format: "anthropic_messages".to_owned(),
                provider_format: None,
                client_request: Some(body),
                headers: headers
                    .iter()
                    .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
                    .collect(),
            },
        })
    }

    fn from_uir(&self, response: &UirResponse, _request: &UirRequest) -> Value {
        let mut content = Vec::new();
        let mut stop_reason = finish_reason_to_stop_reason(response.finish_reason.as_deref());

        for item in &response.output {
            match item {
                OutputItem::Reasoning { content: reasoning, .. } => {
                    for block in reasoning {
                        if let Some(text) = block.as_text() {
                            let signature = block_signature(block).unwrap_or_else(signature_placeholder);
                            content.push(json!({ "type": "thinking", "thinking": text, "signature": signature }));
                        }
                    }
                }
                OutputItem::Message { content: blocks, tool_calls, status, .. } => {
                    for block in blocks {
                        if let Some(text) = block.as_text() {
                            content.push(json!({ "type": "text", "text": text }));
                        }
                    }

                    if let Some(calls) = tool_calls {
                        stop_reason = "tool_use".to_owned();
                        for call in calls {
                            let input: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
                            content.push(json!({
                                "type": "tool_use",
                                "id": call.id,
                                "name": call.name,
                                "input": input,
                            }));
                        }
                    }

                    if matches!(status, crate::uir::MessageStatus::Incomplete) {
                        stop_reason = "max_tokens".to_owned();
                    }
                }
            }
        }

        json!({
            "id": response.id,
            "type": "message",
            "role": "assistant",
            "model": response.model,
            "content": content,
            "stop_reason": stop_reason,
            "stop_sequence": Value::Null,
            "usage": response.usage.as_ref().map(|u| json!({
                "input_tokens": u.input_tokens.unwrap_or(0),
                "output_tokens": u.output_tokens.unwrap_or(0),
            })).unwrap_or(json!({"input_tokens":0,"output_tokens":0})),
        })
    }
}

fn block_signature(block: &ContentBlock) -> Option<String> {
    match block {
        ContentBlock::Reasoning { data: Some(data), .. } => data.get("signature").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

fn finish_reason_to_stop_reason(reason: Option<&str>) -> String {
    match reason {
        Some("tool_calls") => "tool_use",
        Some("length") => "max_tokens",
        Some("stop") | Some("end_turn") | None => "end_turn",
        Some(other) => other,
    }
    .to_owned()
}

/// One inbound Anthropic message may expand into several UIR messages: a
/// `tool_result` content block becomes its own `Role::Tool` message.
fn message_to_uir(msg: &Value) -> Vec<Message> {
    let role = match msg.get("role").and_then(Value::as_str) {
        Some("assistant") => Role::Assistant,
        _ => Role::User,
    };

    let content = match msg.get("content") {
        Some(Value::String(text)) => {
            return vec![Message::text(role, text.clone())];
        }
        Some(Value::Array(blocks)) => blocks,
        _ => return vec![Message { role, content: vec![], tool_calls: None, tool_call_id: None }],
    };

    let mut out_content = Vec::new();
    let mut tool_calls = Vec::new();
    let mut extra_messages = Vec::new();

    for block in content {
        match block.get("type").and_then(Value::as_str) {
            Some("text") | None if block.get("text").is_some() => {
                out_content.push(ContentBlock::text(block.get("text").and_then(Value::as_str).unwrap_or_default()));
            }
            Some("thinking") => {
                let signature = block.get("signature").and_then(Value::as_str);
                out_content.push(ContentBlock::Reasoning {
                    text: block.get("thinking").and_then(Value::as_str).unwrap_or_default().to_owned(),
                    data: signature.map(|s| json!({ "signature": s })),
                });
            }
            Some("image") => {
                out_content.push(image_block_to_uir(block));
            }
            Some("document") => {
                let text = block
                    .get("source")
                    .and_then(|s| s.get("url").or_else(|| s.get("title")))
                    .and_then(Value::as_str)
                    .unwrap_or("document")
                    .to_owned();
                out_content.push(ContentBlock::text(text));
            }
            Some("tool_use") => {
                let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_owned();
                let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_owned();
                let arguments = block.get("input").cloned().unwrap_or(Value::Null).to_string();
                tool_calls.push(ToolCall { id, name, arguments, extra: None });
            }
            Some("tool_result") => {
                let tool_call_id = block.get("tool_use_id").and_then(Value::as_str).map(str::to_owned);
                let text = tool_result_text(block);
                extra_messages.push(Message {
                    role: Role::Tool,
                    content: vec![ContentBlock::text(text)],
                    tool_calls: None,
                    tool_call_id,
                });
            }
            _ => {}
        }
    }

    let mut out = vec![Message {
        role,
        content: out_content,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        tool_call_id: None,
    }];
    out.extend(extra_messages);
    out
}

fn tool_result_text(block: &Value) -> String {
    match block.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// `{type:"url", url}` or `{type:"base64", media_type, data}` both map to
/// `image_url`: the former verbatim, the latter as a data URL (§4.1).
fn image_block_to_uir(block: &Value) -> ContentBlock {
    let source = block.get("source").cloned().unwrap_or(Value::Null);

    match source.get("type").and_then(Value::as_str) {
        Some("url") => ContentBlock::ImageUrl {
            url: source.get("url").and_then(Value::as_str).unwrap_or_default().to_owned(),
        },
        _ => {
            let media_type = source.get("media_type").and_then(Value::as_str).unwrap_or("image/png");
            let data = source.get("data").and_then(Value::as_str).unwrap_or_default();
            ContentBlock::ImageUrl { url: format!("data:{media_type};base64,{data}") }
        }
    }
}

fn tool_to_uir(tool: &Value) -> Option<Tool> {
    let parameters = tool.get("input_schema").cloned()?;

    Some(Tool {
        r#type: "function".to_owned(),
        name: tool.get("name")?.as_str()?.to_owned(),
        description: tool.get("description").and_then(Value::as_str).map(str::to_owned),
        parameters,
        strict: None,
    })
}

#[derive(Debug, Serialize)]
pub struct AnthropicErrorBody {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub error: AnthropicErrorDetails,
}

#[derive(Debug, Serialize)]
pub struct AnthropicErrorDetails {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl From<&LlmError> for AnthropicErrorBody {
    fn from(error: &LlmError) -> Self {
        Self {
            kind: "error",
            error: AnthropicErrorDetails {
                kind: error.code().to_owned(),
                message: error.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use serde_json::json;

    use super::AnthropicMessagesAdapter;
    use crate::{
        client::ClientAdapter,
        uir::{ContentBlock, MessageStatus, Metadata, Operation, OutputItem, Parameters, Role, ToolCall, UirResponse},
    };

    #[test]
    fn tool_result_block_becomes_its_own_tool_message() {
        let adapter = AnthropicMessagesAdapter;
        let body = json!({
            "model": "claude-3",
            "messages": [{
                "role": "user",
                "content": [{ "type": "tool_result", "tool_use_id": "call_1", "content": "42" }],
            }],
        });

        let request = adapter.to_uir(body, &HeaderMap::new()).unwrap();

        assert_eq!(request.messages.len(), 2);
        assert!(matches!(request.messages[0].role, Role::User));
        assert!(matches!(request.messages[1].role, Role::Tool));
        assert_eq!(request.messages[1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(request.messages[1].plain_text(), "42");
    }

    #[test]
    fn reasoning_without_a_cached_signature_gets_the_placeholder() {
        let adapter = AnthropicMessagesAdapter;
        let response = UirResponse {
            id: "resp_1".to_owned(),
            model: "claude-3".to_owned(),
            operation: Operation::Messages,
            finish_reason: Some("stop".to_owned()),
            output: vec![OutputItem::Reasoning { content: vec![ContentBlock::Reasoning { text: "thinking...".to_owned(), data: None }], summary: vec![] }],
            usage: None,
            metadata: None,
            error: None,
        };

        let request = crate::uir::UirRequest {
            id: "req_1".to_owned(),
            model: "claude-3".to_owned(),
            operation: Operation::Messages,
            messages: vec![],
            tools: None,
            parameters: Parameters::default(),
            stream: false,
            state: Default::default(),
            metadata: Metadata::default(),
        };

        let rendered = adapter.from_uir(&response, &request);
        let signature = rendered["content"][0]["signature"].as_str().unwrap();

        assert_eq!(signature, super::signature_placeholder());
    }

    #[test]
    fn tool_call_sets_tool_use_stop_reason() {
        let adapter = AnthropicMessagesAdapter;
        let response = UirResponse {
            id: "resp_1".to_owned(),
            model: "claude-3".to_owned(),
            operation: Operation::Messages,
            finish_reason: Some("tool_calls".to_owned()),
            output: vec![OutputItem::Message {
                role: Role::Assistant,
                content: vec![],
                tool_calls: Some(vec![ToolCall { id: "call_1".to_owned(), name: "search".to_owned(), arguments: "{}".to_owned(), extra: None }]),
                status: MessageStatus::Completed,
            }],
            usage: None,
            metadata: None,
            error: None,
        };

        let request = crate::uir::UirRequest {
            id: "req_1".to_owned(),
            model: "claude-3".to_owned(),
            operation: Operation::Messages,
            messages: vec![],
            tools: None,
            parameters: Parameters::default(),
            stream: false,
            state: Default::default(),
            metadata: Metadata::default(),
        };

        let rendered = adapter.from_uir(&response, &request);

        assert_eq!(rendered["stop_reason"], json!("tool_use"));
        assert_eq!(rendered["content"][0]["type"], json!("tool_use"));
        assert_eq!(rendered["content"][0]["name"], json!("search"));
    }
}
