//! Client dialect adapters (C2): `toUIR` / `fromUIR` for each inbound wire
//! format. All three operate on `serde_json::Value` rather than strict wire
//! structs, mirroring the tolerant-parsing requirements of §4.1 (missing
//! `type` tags, string-or-array `content`, bare `function_call` entries)
//! more directly than a strict schema would allow.

pub mod anthropic_messages;
pub mod openai_chat;
pub mod openai_responses;

use axum::http::HeaderMap;
use serde_json::Value;

use crate::{
    error::Result,
    uir::{Operation, UirRequest, UirResponse},
};

/// `toUIR(body, headers) -> UIR-Request` / `fromUIR(UIR-Response, UIR-Request) -> any-json`.
pub trait ClientAdapter: Send + Sync {
    fn operation(&self) -> Operation;
    fn to_uir(&self, body: Value, headers: &HeaderMap) -> Result<UirRequest>;
    fn from_uir(&self, response: &UirResponse, request: &UirRequest) -> Value;
}

/// Generates `req_<12-char-lowercase-alphanumeric>`, used whenever a client
/// adapter needs to stamp a fresh request id (§4.4 step 2).
pub fn generate_request_id() -> String {
    generate_id("req")
}

pub fn generate_id(prefix: &str) -> String {
    use rand::Rng as _;
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    let suffix: String = (0..12).map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char).collect();
    format!("{prefix}_{suffix}")
}
