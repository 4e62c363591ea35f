//! SSE rendering of an already-completed rendered response (§6 "Streaming").
//! The pipeline always runs to completion first — there is no true
//! token-level streaming from the provider — then this chunks the result
//! into `data: <json>\n\n` frames with a configurable delay, preserving
//! array-typed content order, terminated by `data: [DONE]`.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::Event;
use futures::{Stream, StreamExt as _};
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct StreamingConfig {
    pub chunk_size: usize,
    pub delay: Duration,
}

impl From<&config::StreamingConfig> for StreamingConfig {
    fn from(config: &config::StreamingConfig) -> Self {
        Self { chunk_size: config.chunk_size.max(1), delay: Duration::from_millis(config.delay) }
    }
}

/// Splits `rendered`'s text-bearing content into `chunk_size`-character
/// deltas and renders each as its own SSE frame, then a final `[DONE]`.
pub fn render_sse(rendered: Value, config: StreamingConfig) -> impl Stream<Item = Result<Event, Infallible>> {
    let chunks = chunk_deltas(&rendered, config.chunk_size);
    let delay = config.delay;

    let frames = futures::stream::iter(chunks.into_iter().enumerate()).then(move |(i, chunk)| async move {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(Event::default().data(chunk.to_string()))
    });

    frames.chain(futures::stream::once(async { Ok(Event::default().data("[DONE]")) }))
}

/// Breaks every text delta found at `$.choices[].message.content` (OpenAI
/// chat) or `$.content[].text` (Anthropic messages) into `chunk_size`-sized
/// pieces, each carried in its own shallow clone of `rendered` with only
/// that delta substituted — good enough for a reference SSE splitter that
/// doesn't need to model true incremental deltas.
fn chunk_deltas(rendered: &Value, chunk_size: usize) -> Vec<Value> {
    if let Some(text) = rendered.pointer("/choices/0/message/content").and_then(Value::as_str) {
        return text_chunks(text, chunk_size)
            .map(|piece| {
                let mut frame = rendered.clone();
                frame["choices"][0]["message"]["content"] = Value::String(piece);
                frame
            })
            .collect();
    }

    if let Some(blocks) = rendered.get("content").and_then(Value::as_array) {
        let mut frames = Vec::new();
        for (idx, block) in blocks.iter().enumerate() {
            if let Some(text) = block.get("text").and_then(Value::as_str) {
                for piece in text_chunks(text, chunk_size) {
                    let mut frame = rendered.clone();
                    frame["content"][idx]["text"] = Value::String(piece);
                    frames.push(frame);
                }
            }
        }
        if !frames.is_empty() {
            return frames;
        }
    }

    if let Some(items) = rendered.get("output").and_then(Value::as_array) {
        let mut frames = Vec::new();
        for (item_idx, item) in items.iter().enumerate() {
            let Some(content_blocks) = item.get("content").and_then(Value::as_array) else { continue };
            for (block_idx, block) in content_blocks.iter().enumerate() {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    for piece in text_chunks(text, chunk_size) {
                        let mut frame = rendered.clone();
                        frame["output"][item_idx]["content"][block_idx]["text"] = Value::String(piece);
                        frames.push(frame);
                    }
                }
            }
        }
        if !frames.is_empty() {
            return frames;
        }
    }

    vec![rendered.clone()]
}

fn text_chunks(text: &str, chunk_size: usize) -> impl Iterator<Item = String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size.max(1))
        .map(|piece| piece.iter().collect::<String>())
        .collect::<Vec<_>>()
        .into_iter()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::chunk_deltas;

    #[test]
    fn chunks_openai_content_preserving_order() {
        let rendered = json!({ "choices": [{ "message": { "content": "hello world" } }] });
        let chunks = chunk_deltas(&rendered, 5);

        let joined: String = chunks
            .iter()
            .map(|c| c.pointer("/choices/0/message/content").unwrap().as_str().unwrap())
            .collect();

        assert_eq!(joined, "hello world");
    }

    #[test]
    fn falls_back_to_single_frame_when_no_text_found() {
        let rendered = json!({ "choices": [{ "message": { "content": null, "tool_calls": [] } }] });
        let chunks = chunk_deltas(&rendered, 5);
        assert_eq!(chunks.len(), 1);
    }
}
