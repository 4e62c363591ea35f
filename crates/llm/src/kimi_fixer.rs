//! Kimi fixer (C8): salvages structured tool calls from two known-bad shapes
//! certain OpenAI-compatible upstreams (the Kimi family) emit (§4.6).
//! Pure `serde_json::Value` surgery — no provider/transport knowledge — so
//! it can be unit tested directly and reused from `KimiResponseTransform`.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::uir::Tool;

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<\|tool_calls_section_begin\|>(.*?)<\|tool_calls_section_end\|>").unwrap());
static CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<\|tool_call_begin\|>(.*?)<\|tool_call_argument_begin\|>(.*?)<\|tool_call_end\|>").unwrap());

/// Runs both repairs over `body.choices[0].message` in place. Idempotent: a
/// second call on an already-fixed body is a no-op (renamed tools are no
/// longer numeric; sentinel blocks have already been stripped).
pub fn fix(body: &mut Value, tools: &[Tool]) {
    let Some(message) = body.pointer_mut("/choices/0/message") else { return };

    let mut extracted_from_content = 0u32;
    let mut extracted_from_reasoning = 0u32;

    if let Some(Value::String(text)) = message.get("content").cloned() {
        let (remainder, calls) = extract_sentinel_calls(&text);
        if !calls.is_empty() {
            extracted_from_content = calls.len() as u32;
            append_tool_calls(message, calls);
            message["content"] = Value::String(remainder);
        }
    }

    for key in ["reasoning_content", "reasoning"] {
        if let Some(Value::String(text)) = message.get(key).cloned() {
            let (remainder, calls) = extract_sentinel_calls(&text);
            if !calls.is_empty() {
                extracted_from_reasoning += calls.len() as u32;
                append_tool_calls(message, calls);
                message[key] = Value::String(remainder);
            }
        }
    }

    let mut repaired_tool_names = 0u32;
    if let Some(calls) = message.get_mut("tool_calls").and_then(Value::as_array_mut) {
        for call in calls.iter_mut() {
            if repair_numeric_name(call, tools) {
                repaired_tool_names += 1;
            }
        }
    }

    let extracted_total = extracted_from_content + extracted_from_reasoning;
    if extracted_total > 0 || repaired_tool_names > 0 {
        let metadata = body.as_object_mut().unwrap().entry("metadata").or_insert_with(|| json!({}));
        if let Some(map) = metadata.as_object_mut() {
            map.insert("extractedToolCalls".to_owned(), json!(extracted_total));
            map.insert("extractedFromContent".to_owned(), json!(extracted_from_content));
            map.insert("extractedFromReasoning".to_owned(), json!(extracted_from_reasoning));
            map.insert("repairedToolNames".to_owned(), json!(repaired_tool_names));
        }
    }
}

/// Pulls every `<name, args>` pair out of every sentinel section in `text`,
/// returning the text with those sections stripped alongside the calls.
fn extract_sentinel_calls(text: &str) -> (String, Vec<(String, String)>) {
    let mut calls = Vec::new();

    for section in SECTION_RE.captures_iter(text) {
        let body = &section[1];
        for call in CALL_RE.captures_iter(body) {
            let name = call[1].trim().to_owned();
            let args = call[2].trim().to_owned();
            calls.push((name, args));
        }
    }

    if calls.is_empty() {
        return (text.to_owned(), calls);
    }

    let remainder = SECTION_RE.replace_all(text, "").trim().to_owned();
    (remainder, calls)
}

fn append_tool_calls(message: &mut Value, calls: Vec<(String, String)>) {
    let entries: Vec<Value> = calls
        .into_iter()
        .map(|(name, args)| {
            let id = format!("{name}_call_{}", random_suffix());
            json!({ "id": id, "type": "function", "function": { "name": name, "arguments": args } })
        })
        .collect();

    match message.get_mut("tool_calls").and_then(Value::as_array_mut) {
        Some(existing) => existing.extend(entries),
        None => {
            if let Some(obj) = message.as_object_mut() {
                obj.insert("tool_calls".to_owned(), Value::Array(entries));
            }
        }
    }
}

fn random_suffix() -> String {
    use rand::Rng as _;
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..8).map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char).collect()
}

/// If `call.function.name` is numeric (integer or numeric string) and
/// exactly one declared tool's required-parameter set is a subset of the
/// call's provided argument keys, renames the call to that tool. Returns
/// whether a rename happened.
fn repair_numeric_name(call: &mut Value, tools: &[Tool]) -> bool {
    let Some(function) = call.get_mut("function") else { return false };
    let is_numeric = match function.get("name") {
        Some(Value::Number(_)) => true,
        Some(Value::String(s)) => s.parse::<i64>().is_ok(),
        _ => false,
    };
    if !is_numeric {
        return false;
    }

    let arg_keys: Vec<String> = function
        .get("arguments")
        .and_then(Value::as_str)
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .and_then(|v| v.as_object().map(|o| o.keys().cloned().collect()))
        .unwrap_or_default();

    let mut matches = tools.iter().filter(|tool| {
        let required = tool
            .parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect::<Vec<_>>())
            .unwrap_or_default();
        required.iter().all(|key| arg_keys.iter().any(|arg| arg == key))
    });

    let first = matches.next();
    if first.is_some() && matches.next().is_none() {
        function["name"] = Value::String(first.unwrap().name.clone());
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::uir::Tool;

    use super::fix;

    fn tool(name: &str, required: &[&str]) -> Tool {
        Tool {
            r#type: "function".to_owned(),
            name: name.to_owned(),
            description: None,
            parameters: json!({ "type": "object", "required": required }),
            strict: None,
        }
    }

    #[test]
    fn repairs_numeric_tool_name_via_required_param_match() {
        let tools = vec![tool("get_weather", &["location"]), tool("get_stock_price", &["symbol"])];

        let mut body = json!({
            "choices": [{ "message": {
                "tool_calls": [{ "id": "c1", "function": { "name": "15", "arguments": "{\"location\":\"NYC\"}" } }],
            } }],
        });

        fix(&mut body, &tools);

        assert_eq!(body["choices"][0]["message"]["tool_calls"][0]["function"]["name"], "get_weather");
        assert_eq!(body["metadata"]["repairedToolNames"], 1);
    }

    #[test]
    fn extracts_sentinel_blocks_from_reasoning_content() {
        let tools = vec![tool("get_weather", &["location"])];

        let mut body = json!({
            "choices": [{ "message": {
                "content": "",
                "reasoning_content": "thinking...<|tool_calls_section_begin|><|tool_call_begin|>get_weather<|tool_call_argument_begin|>{\"location\":\"NYC\"}<|tool_call_end|><|tool_calls_section_end|> done",
            } }],
        });

        fix(&mut body, &tools);

        let message = &body["choices"][0]["message"];
        assert_eq!(message["tool_calls"][0]["function"]["name"], "get_weather");
        assert_eq!(message["tool_calls"][0]["function"]["arguments"], "{\"location\":\"NYC\"}");
        assert!(!message["reasoning_content"].as_str().unwrap().contains("tool_calls_section_begin"));
        assert_eq!(body["metadata"]["extractedFromReasoning"], 1);
    }

    #[test]
    fn sentinel_block_with_a_numeric_call_sets_both_reasoning_and_rename_counters() {
        let tools = vec![tool("get_weather", &["location"])];

        let mut body = json!({
            "choices": [{ "message": {
                "reasoning_content": "thinking...<|tool_calls_section_begin|><|tool_call_begin|>0<|tool_call_argument_begin|>{\"location\":\"NYC\"}<|tool_call_end|><|tool_calls_section_end|> done",
            } }],
        });

        fix(&mut body, &tools);

        let message = &body["choices"][0]["message"];
        assert_eq!(message["tool_calls"][0]["function"]["name"], "get_weather");
        assert_eq!(body["metadata"]["extractedFromReasoning"], 1);
        assert_eq!(body["metadata"]["repairedToolNames"], 1);
    }

    #[test]
    fn is_idempotent() {
        let tools = vec![tool("get_weather", &["location"])];

        let mut body = json!({
            "choices": [{ "message": {
                "reasoning_content": "<|tool_calls_section_begin|><|tool_call_begin|>get_weather<|tool_call_argument_begin|>{\"location\":\"NYC\"}<|tool_call_end|><|tool_calls_section_end|>",
            } }],
        });

        fix(&mut body, &tools);
        let once = body.clone();
        fix(&mut body, &tools);

        assert_eq!(body["choices"], once["choices"]);
    }
}
