//! OpenAI Responses dialect (`POST /v1/responses`).
//!
//! `input` is the most permissive shape among the three dialects: a bare
//! string, an array of strings, an array of message objects (with or
//! without `type`), or bare `function_call` / `function_call_output`
//! entries carrying no `type` tag at all (§4.1).

use axum::http::HeaderMap;
use serde_json::{Value, json};

use crate::{
    client::{ClientAdapter, generate_id, generate_request_id},
    error::{LlmError, Result},
    uir::{ContentBlock, Message, Metadata, Operation, OutputItem, Parameters, Role, Tool, ToolCall, UirRequest, UirResponse},
};

pub struct OpenAiResponsesAdapter;

impl ClientAdapter for OpenAiResponsesAdapter {
    fn operation(&self) -> Operation {
        Operation::Responses
    }

    fn to_uir(&self, body: Value, headers: &HeaderMap) -> Result<UirRequest> {
        let model = body
            .get("model")
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::InvalidRequest("missing `model`".into()))?
            .to_owned();

        let mut messages = Vec::new();

        if let Some(system) = body.get("instructions").and_then(Value::as_str) {
            messages.push(Message::text(Role::System, system));
        }

        match body.get("input") {
            Some(Value::String(text)) => messages.push(Message::text(Role::User, text.clone())),
            Some(Value::Array(items)) => {
                let mut buffered = String::new();

                for item in items {
                    match item {
                        Value::String(text) => {
                            if !buffered.is_empty() {
                                buffered.push('\n');
                            }
                            buffered.push_str(text);
                        }
                        Value::Object(_) => {
                            if !buffered.is_empty() {
                                messages.push(Message::text(Role::User, std::mem::take(&mut buffered)));
                            }
                            messages.push(input_item_to_uir(item));
                        }
                        _ => {}
                    }
                }

                if !buffered.is_empty() {
                    messages.push(Message::text(Role::User, buffered));
                }
            }
            _ => {}
        }

        let tools = body.get("tools").and_then(Value::as_array).map(|tools| {
            tools.iter().filter_map(tool_to_uir).collect::<Vec<_>>()
        });

        Ok(UirRequest {
            id: generate_request_id(),
            model,
            operation: Operation::Responses,
            messages,
            tools,
            parameters: Parameters {
                temperature: body.get("temperature").and_then(Value::as_f64).map(|v| v as f32),
                top_p: body.get("top_p").and_then(Value::as_f64).map(|v| v as f32),
                top_k: None,
                max_tokens: body.get("max_output_tokens").and_then(Value::as_u64).map(|v| v as u32),
            },
            stream: body.get("stream").and_then(Value::as_bool).unwrap_or(false),
            state: Default::default(),
            metadata: Metadata {
                client_format: "openai_responses".to_owned(),
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
        let mut output = Vec::new();

        for item in &response.output {
            match item {
                OutputItem::Reasoning { content, summary } => {
                    output.push(json!({
                        "type": "reasoning",
                        "content": content.iter().filter_map(ContentBlock::as_text).map(|t| json!({"type":"reasoning_text","text":t})).collect::<Vec<_>>(),
                        "summary": summary.iter().filter_map(ContentBlock::as_text).map(|t| json!({"type":"summary_text","text":t})).collect::<Vec<_>>(),
                    }));
                }
                OutputItem::Message { role, content, tool_calls, status } => {
                    if let Some(calls) = tool_calls {
                        for call in calls {
                            output.push(json!({
                                "type": "function_call",
                                "call_id": call.id,
                                "name": call.name,
                                "arguments": call.arguments,
                            }));
                        }
                    }

                    let text_blocks: Vec<Value> = content
                        .iter()
                        .filter_map(ContentBlock::as_text)
                        .map(|t| json!({"type": "output_text", "text": t}))
                        .collect();

                    if !text_blocks.is_empty() {
                        output.push(json!({
                            "type": "message",
                            "role": role_to_str(*role),
                            "status": if matches!(status, crate::uir::MessageStatus::Incomplete) { "incomplete" } else { "completed" },
                            "content": text_blocks,
                        }));
                    }
                }
            }
        }

        json!({
            "id": response.id,
            "object": "response",
            "model": response.model,
            "status": if response.error.is_some() { "failed" } else { "completed" },
            "output": output,
            "usage": response.usage.as_ref().map(|u| json!({
                "input_tokens": u.input_tokens.unwrap_or(0),
                "output_tokens": u.output_tokens.unwrap_or(0),
                "total_tokens": u.total_tokens.unwrap_or(0),
            })),
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

/// Converts one `input[]` entry. Bare `function_call` / `function_call_output`
/// entries (no `type`) route to an assistant tool-call / tool message
/// respectively, matching real-world SDK output (§4.1).
fn input_item_to_uir(item: &Value) -> Message {
    let item_type = item.get("type").and_then(Value::as_str);

    if item_type == Some("function_call") || (item_type.is_none() && item.get("call_id").is_some() && item.get("name").is_some()) {
        let id = item
            .get("call_id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| generate_id("call"));

        let name = item.get("name").and_then(Value::as_str).unwrap_or_default().to_owned();
        let arguments = match item.get("arguments") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "{}".to_owned(),
        };

        return Message {
            role: Role::Assistant,
            content: vec![],
            tool_calls: Some(vec![ToolCall { id, name, arguments, extra: None }]),
            tool_call_id: None,
        };
    }

    if item_type == Some("function_call_output") || (item_type.is_none() && item.get("call_id").is_some() && item.get("output").is_some()) {
        let tool_call_id = item.get("call_id").and_then(Value::as_str).map(str::to_owned);
        let output_text = match item.get("output") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        return Message {
            role: Role::Tool,
            content: vec![ContentBlock::text(output_text)],
            tool_calls: None,
            tool_call_id,
        };
    }

    let role = match item.get("role").and_then(Value::as_str) {
        Some("system") => Role::System,
        Some("assistant") => Role::Assistant,
        Some("tool") => Role::Tool,
        _ => Role::User,
    };

    let content = match item.get("content") {
        Some(Value::String(text)) => vec![ContentBlock::text(text.clone())],
        Some(Value::Array(blocks)) => blocks
            .iter()
            .map(|b| {
                let text = b.get("text").and_then(Value::as_str).unwrap_or_default();
                ContentBlock::text(text)
            })
            .collect(),
        _ => vec![],
    };

    Message {
        role,
        content,
        tool_calls: None,
        tool_call_id: None,
    }
}

fn tool_to_uir(tool: &Value) -> Option<Tool> {
    let parameters = tool.get("parameters").cloned()?;

    Some(Tool {
        r#type: "function".to_owned(),
        name: tool.get("name")?.as_str()?.to_owned(),
        description: tool.get("description").and_then(Value::as_str).map(str::to_owned),
        parameters,
        strict: tool.get("strict").and_then(Value::as_bool),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use serde_json::json;

    use super::OpenAiResponsesAdapter;
    use crate::{client::ClientAdapter, uir::Role};

    #[test]
    fn bare_function_call_entries_without_a_type_tag_are_recognized() {
        let adapter = OpenAiResponsesAdapter;
        let body = json!({
            "model": "gpt-4",
            "input": [
                "What's the weather?",
                { "call_id": "call_1", "name": "get_weather", "arguments": "{\"city\":\"nyc\"}" },
                { "call_id": "call_1", "output": "72F and sunny" },
            ],
        });

        let request = adapter.to_uir(body, &HeaderMap::new()).unwrap();

        assert_eq!(request.messages.len(), 3);
        assert!(matches!(request.messages[0].role, Role::User));

        assert!(matches!(request.messages[1].role, Role::Assistant));
        let calls = request.messages[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "get_weather");

        assert!(matches!(request.messages[2].role, Role::Tool));
        assert_eq!(request.messages[2].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(request.messages[2].plain_text(), "72F and sunny");
    }

    #[test]
    fn consecutive_strings_buffer_into_one_user_message() {
        let adapter = OpenAiResponsesAdapter;
        let body = json!({
            "model": "gpt-4",
            "input": [
                "first line",
                "second line",
                { "call_id": "call_1", "name": "get_weather", "arguments": "{}" },
            ],
        });

        let request = adapter.to_uir(body, &HeaderMap::new()).unwrap();

        assert_eq!(request.messages.len(), 2);
        assert!(matches!(request.messages[0].role, Role::User));
        assert_eq!(request.messages[0].plain_text(), "first line\nsecond line");
        assert!(matches!(request.messages[1].role, Role::Assistant));
    }
}
