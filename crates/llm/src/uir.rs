//! The Unified Intermediate Representation (UIR): the dialect-neutral
//! request/response model every client and provider adapter converts
//! through. Nothing downstream of `toUIR` or upstream of `fromUIR` should
//! need to know which wire dialect produced or will consume a value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which client-facing dialect a request arrived as / a response renders as.
/// Preserved end-to-end so the controller knows which `fromUIR` to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Chat,
    Messages,
    Responses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A unit of message content. Tagged so adapters that only understand a
/// subset of blocks (e.g. Anthropic `reasoning` → `thinking`) can match on
/// `type` without guessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { url: String },
    Json { data: Value },
    Reasoning {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Best-effort extraction of this block's displayable text, used by the
    /// "meaningful content" check in ensure-tool-call (§4.5).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } | ContentBlock::Reasoning { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// `{ id, type="function", name, arguments }`. `arguments` is always the
/// JSON-serialized form; validity (parseable JSON) is enforced by
/// `ValidateToolArgumentsTransform`, not by this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
    /// Provider-specific passthrough data not modeled by UIR proper — currently
    /// only the Google `{ google: { thought_signature } }` envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Invariant: `tool_call_id` present iff `role == Role::Tool`; `tool_calls`
/// only ever populated on `role == Role::Assistant`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::text(text)],
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Concatenation of every text-bearing block, used by the "meaningful
    /// content" check (§4.5).
    pub fn plain_text(&self) -> String {
        self.content.iter().filter_map(ContentBlock::as_text).collect::<Vec<_>>().join("")
    }

    pub fn has_meaningful_content(&self) -> bool {
        self.content.iter().any(|block| match block {
            ContentBlock::Text { text } | ContentBlock::Reasoning { text, .. } => !text.trim().is_empty(),
            ContentBlock::Json { data } => is_meaningful_json(data),
            ContentBlock::ImageUrl { .. } => true,
        })
    }
}

fn is_meaningful_json(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type", default = "function_type")]
    pub r#type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

fn function_type() -> String {
    "function".to_owned()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub client_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request: Option<Value>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Ensure-tool-call's cross-request scratch state (§3, §4.5). Lives inside
/// `PipelineState::ensure_tool_call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsureToolCallState {
    pub enabled: bool,
    #[serde(default = "default_termination_tool_name")]
    pub termination_tool_name: String,
    #[serde(default)]
    pub reminder_count: u32,
    #[serde(default)]
    pub pending_reminder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_history: Option<Vec<String>>,
}

pub fn default_termination_tool_name() -> String {
    "done".to_owned()
}

impl EnsureToolCallState {
    pub fn new(termination_tool_name: String) -> Self {
        Self {
            enabled: true,
            termination_tool_name,
            reminder_count: 0,
            pending_reminder: false,
            final_answer_required: None,
            reminder_history: None,
        }
    }
}

/// Replaces an untyped `state: mapping<string, any-json>` scratchpad (Design
/// Note "Dynamic state bag") with named fields for every control flag the
/// controller and transforms read or write, plus an open `extra` map for
/// anything that doesn't yet deserve a dedicated field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    /// `__pipelineMaxAttempts`, 1–5.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// `__pipelineRetryRequested`, cleared every iteration.
    #[serde(default)]
    pub retry_requested: bool,
    /// `__syntheticResponseRequested`, cleared after use.
    #[serde(default)]
    pub synthetic_requested: bool,
    /// `__ensureToolCall`.
    #[serde(default)]
    pub ensure_tool_call: Option<EnsureToolCallState>,
    /// The client-visible model alias, preserved once the router substitutes
    /// `request.model` with the concrete upstream model id.
    #[serde(default)]
    pub resolved_model: Option<String>,
    #[serde(default)]
    pub max_tokens_clamped: bool,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

/// `{ id, model, operation, messages, tools?, parameters, stream, state, metadata }`.
/// Created per inbound HTTP request by a client adapter; mutated only by
/// transforms and the pipeline controller; never shared across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UirRequest {
    pub id: String,
    pub model: String,
    pub operation: Operation,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub state: PipelineState,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Completed,
    Incomplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        role: Role,
        content: Vec<ContentBlock>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
        status: MessageStatus,
    },
    Reasoning {
        content: Vec<ContentBlock>,
        #[serde(default)]
        summary: Vec<ContentBlock>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UirError {
    pub message: String,
    pub code: String,
}

/// `{ id, model, operation, finish_reason?, output, usage?, metadata?, error? }`.
/// `error` is mutually exclusive with a normal completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UirResponse {
    pub id: String,
    pub model: String,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<UirError>,
}

impl UirResponse {
    /// Places `Reasoning` items ahead of everything else, preserving
    /// relative order within each group (invariant #2, §8).
    pub fn with_reasoning_first(mut self) -> Self {
        self.output.sort_by_key(|item| !matches!(item, OutputItem::Reasoning { .. }));
        self
    }
}

/// `{ status, headers, body, requestBody? }`. `status >= 400` means the raw
/// call failed and the pipeline short-circuits to error rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
}

impl ProviderResponse {
    pub fn is_synthetic(&self) -> bool {
        self.headers.get("x-synthetic-response").map(String::as_str) == Some("true")
    }
}
