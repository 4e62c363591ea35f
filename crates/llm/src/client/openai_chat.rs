//! OpenAI Chat Completions dialect (`POST /v1/chat/completions`).

use axum::http::HeaderMap;
use serde_json::{Value, json};

use crate::{
    client::{ClientAdapter, generate_request_id},
    error::{LlmError, Result},
    uir::{ContentBlock, Message, Metadata, Operation, OutputItem, Parameters, Role, Tool, ToolCall, UirRequest, UirResponse},
};

pub struct OpenAiChatAdapter;

impl ClientAdapter for OpenAiChatAdapter {
    fn operation(&self) -> Operation {
        Operation::Chat
    }

    fn to_uir(&self, body: Value, headers: &HeaderMap) -> Result<UirRequest> {
        let model = body
            .get("model")
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::InvalidRequest("missing `model`".into()))?
            .to_owned();

        let messages = body
            .get("messages")
            .and_then(Value::as_array)
            .ok_or_else(|| LlmError::InvalidRequest("missing `messages`".into()))?
            .iter()
            .map(message_to_uir)
            .collect::<Result<Vec<_>>>()?;

        let tools = body.get("tools").and_then(Value::as_array).map(|tools| {
            tools.iter().filter_map(tool_to_uir).collect::<Vec<_>>()
        });

        Ok(UirRequest {
            id: generate_request_id(),
            model,
            operation: Operation::Chat,
            messages,
            tools,
            parameters: Parameters {
                temperature: body.get("temperature").and_then(Value::as_f64).map(|v| v as f32),
                top_p: body.get("top_p").and_then(Value::as_f64).map(|v| v as f32),
                top_k: None,
                max_tokens: body.get("max_tokens").and_then(Value::as_u64).map(|v| v as u32),
            },
            stream: body.get("stream").and_then(Value::as_bool).unwrap_or(false),
            state: Default::default(),
            metadata: Metadata {
                client_format: "openai_chat".to_owned(),
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
        let mut reasoning_content: Option<String> = None;
        let mut message_json = json!({ "role": "assistant", "content": Value::Null });
        let mut finish_reason = response.finish_reason.clone().unwrap_or_else(|| "stop".to_owned());

        for item in &response.output {
            match item {
                OutputItem::Reasoning { content, .. } => {
                    let text: String = content.iter().filter_map(ContentBlock::as_text).collect();
                    reasoning_content = Some(text);
                }
                OutputItem::Message { role, content, tool_calls, status } => {
                    let text: String = content.iter().filter_map(ContentBlock::as_text).collect();
                    message_json["role"] = json!(role_to_str(*role));
                    message_json["content"] = if text.is_empty() { Value::Null } else { json!(text) };

                    if let Some(calls) = tool_calls {
                        message_json["tool_calls"] = json!(
                            calls
                                .iter()
                                .map(|c| json!({
                                    "id": c.id,
                                    "type": "function",
                                    "function": { "name": c.name, "arguments": c.arguments },
                                }))
                                .collect::<Vec<_>>()
                        );
                        if response.finish_reason.is_none() {
                            finish_reason = "tool_calls".to_owned();
                        }
                    }

                    if matches!(status, crate::uir::MessageStatus::Incomplete) {
                        finish_reason = "length".to_owned();
                    }
                }
            }
        }

        if let Some(reasoning) = reasoning_content {
            message_json["reasoning_content"] = json!(reasoning);
        }

        json!({
            "id": response.id,
            "object": "chat.completion",
            "model": response.model,
            "choices": [{
                "index": 0,
                "message": message_json,
                "finish_reason": finish_reason,
            }],
            "usage": response.usage.as_ref().map(|u| json!({
                "prompt_tokens": u.input_tokens.unwrap_or(0),
                "completion_tokens": u.output_tokens.unwrap_or(0),
                "total_tokens": u.total_tokens.unwrap_or(0),
            })).unwrap_or(json!({"prompt_tokens":0,"completion_tokens":0,"total_tokens":0})),
        })
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn str_to_role(s: &str) -> Role {
    match s {
        "system" => Role::System,
        "assistant" => Role::Assistant,
        "tool" => Role::Tool,
        _ => Role::User,
    }
}

fn message_to_uir(msg: &Value) -> Result<Message> {
    let role = str_to_role(msg.get("role").and_then(Value::as_str).unwrap_or("user"));

    let content = match msg.get("content") {
        Some(Value::String(text)) => vec![ContentBlock::text(text.clone())],
        Some(Value::Array(blocks)) => blocks.iter().map(content_block_to_uir).collect(),
        _ => vec![],
    };

    let tool_calls = msg.get("tool_calls").and_then(Value::as_array).map(|calls| {
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
                let name = function
                    .get("name")
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_default();

                let arguments = match function.get("arguments") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => "{}".to_owned(),
                };

                ToolCall { id, name, arguments, extra: None }
            })
            .collect()
    });

    Ok(Message {
        role,
        content,
        tool_calls,
        tool_call_id: msg.get("tool_call_id").and_then(Value::as_str).map(str::to_owned),
    })
}

/// Missing `type` defaults to `text` if a `text` field is present (§4.1).
fn content_block_to_uir(block: &Value) -> ContentBlock {
    let block_type = block.get("type").and_then(Value::as_str);

    match block_type {
        Some("image_url") => ContentBlock::ImageUrl {
            url: block
                .get("image_url")
                .and_then(|v| v.get("url"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
        },
        Some("text") | None => {
            let text = block.get("text").and_then(Value::as_str).unwrap_or_default();
            ContentBlock::text(text)
        }
        _ => ContentBlock::Json { data: block.clone() },
    }
}

/// Provider-defined tools without `input_schema`/`parameters` are dropped (§4.1).
fn tool_to_uir(tool: &Value) -> Option<Tool> {
    let function = tool.get("function")?;
    let parameters = function.get("parameters")?.clone();

    Some(Tool {
        r#type: "function".to_owned(),
        name: function.get("name")?.as_str()?.to_owned(),
        description: function.get("description").and_then(Value::as_str).map(str::to_owned),
        parameters,
        strict: function.get("strict").and_then(Value::as_bool),
    })
}
