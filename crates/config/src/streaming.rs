use serde::Deserialize;

/// SSE chunking configuration for streaming responses (§6 "Streaming").
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct StreamingConfig {
    /// Delay between successive SSE chunks, in milliseconds.
    pub delay: u64,
    /// Number of characters of text delta per SSE chunk.
    pub chunk_size: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self { delay: 0, chunk_size: 5 }
    }
}
