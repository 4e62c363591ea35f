//! Synthetic response factory (C10): a well-formed empty-assistant
//! `UIR-Response`, emitted whenever the pipeline short-circuits without
//! calling the provider (§4.4 step 4a, §4.9).

use crate::uir::{MessageStatus, OutputItem, ProviderResponse, Role, Usage, UirRequest, UirResponse};
use serde_json::{Value, json};

pub fn synthetic_provider_response() -> ProviderResponse {
    ProviderResponse {
        status: 200,
        headers: [("x-synthetic-response".to_owned(), "true".to_owned())].into_iter().collect(),
        body: json!({}),
        request_body: None,
    }
}

pub fn synthetic_response(request: &UirRequest) -> UirResponse {
    UirResponse {
        id: format!("synth_{}", request.id),
        model: "synthetic".to_owned(),
        operation: request.operation,
        finish_reason: Some("stop".to_owned()),
        output: vec![OutputItem::Message {
            role: Role::Assistant,
            content: vec![],
            tool_calls: None,
            status: MessageStatus::Completed,
        }],
        usage: Some(Usage { input_tokens: Some(0), output_tokens: Some(0), total_tokens: Some(0) }),
        metadata: Some(Value::from(synthetic_metadata())),
        error: None,
    }
}

fn synthetic_metadata() -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    map.insert("synthetic".to_owned(), Value::Bool(true));
    map
}
