//! The LLM reverse-proxy pipeline: client dialect adapters, provider
//! adapters, the transform stage registry, the pipeline controller, and the
//! axum router wiring them to the three HTTP routes (§6).

use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, State},
    http::HeaderMap,
    response::{IntoResponse, Response, Sse},
    routing::post,
};
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::Value;
use store::LogStore;

pub mod client;
mod error;
mod kimi_fixer;
pub mod pipeline;
pub mod provider;
pub mod router;
pub mod signature_cache;
mod streaming;
mod synthetic;
pub mod transform;
pub mod uir;

pub use error::{AnthropicApiResult, LlmError, Result};

use client::{ClientAdapter, anthropic_messages::AnthropicMessagesAdapter, openai_chat::OpenAiChatAdapter, openai_responses::OpenAiResponsesAdapter};
use error::AnthropicErrorResponse;
use pipeline::PipelineController;
use signature_cache::{InMemorySignatureCache, SignatureCache};

struct AppState {
    pipeline: PipelineController,
    streaming: streaming::StreamingConfig,
    chat_adapter: OpenAiChatAdapter,
    messages_adapter: AnthropicMessagesAdapter,
    responses_adapter: OpenAiResponsesAdapter,
}

/// Builds the axum router for the three client dialects (§6 "HTTP surface"),
/// wiring a single shared `PipelineController` behind all of them.
pub async fn router(config: &config::Config) -> anyhow::Result<Router> {
    let log_store = build_log_store(config)?;
    let signature_cache = build_signature_cache();
    let providers = build_providers(config)?;
    let model_router = router::ModelRouter::new(config.models.clone());
    let (ingress, provider_stage, egress) = transform::build_registries();

    let pipeline = PipelineController::new(
        providers,
        model_router,
        ingress,
        provider_stage,
        egress,
        transform::TransformDeps { signature_cache },
        log_store,
    );

    let state = Arc::new(AppState {
        pipeline,
        streaming: streaming::StreamingConfig::from(&config.streaming),
        chat_adapter: OpenAiChatAdapter,
        messages_adapter: AnthropicMessagesAdapter,
        responses_adapter: OpenAiResponsesAdapter,
    });

    Ok(Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/messages", post(messages))
        .route("/v1/responses", post(responses))
        .with_state(state))
}

fn build_log_store(config: &config::Config) -> anyhow::Result<Option<Arc<LogStore>>> {
    let store = LogStore::open(&config.logging.db_path, &config.logging.blob_root)
        .map_err(|err| anyhow::anyhow!("failed to open log store: {err}"))?;
    Ok(Some(Arc::new(store)))
}

fn build_signature_cache() -> Arc<dyn SignatureCache> {
    // Thought signatures only need to survive the in-flight conversation;
    // `SqliteSignatureCache` is available for deployments that want them to
    // survive a process restart.
    Arc::new(InMemorySignatureCache::default())
}

fn build_providers(config: &config::Config) -> anyhow::Result<provider::ProviderRegistry> {
    let mut registry = provider::ProviderRegistry::new();

    if let Some(openai) = &config.providers.openai {
        registry.register(Box::new(provider::openai::OpenAiProvider::new(clone_secret(&openai.api_key), openai.base_url.clone())));
    }

    if let Some(openrouter) = &config.providers.openrouter {
        registry.register(Box::new(provider::openrouter::OpenRouterProvider::new(clone_secret(&openrouter.api_key))));
    }

    if let Some(vertex) = &config.providers.vertex {
        registry.register(Box::new(provider::vertex::VertexProvider::new(
            vertex.project_id.clone(),
            vertex.location.clone(),
            vertex.credentials.as_ref().map(clone_secret),
            vertex.credentials_path.clone(),
            vertex.endpoint_override.clone(),
        )?));
    }

    if let Some(anthropic) = &config.providers.anthropic {
        registry.register(Box::new(provider::anthropic::AnthropicProvider::new(
            clone_secret(&anthropic.api_key),
            anthropic.base_url.clone(),
        )));
    }

    Ok(registry)
}

fn clone_secret(value: &SecretString) -> SecretString {
    SecretString::from(value.expose_secret().to_owned())
}

async fn chat_completions(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    match handle(&state, &state.chat_adapter, body, headers).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn responses(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    match handle(&state, &state.responses_adapter, body, headers).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn messages(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    match handle(&state, &state.messages_adapter, body, headers).await {
        Ok(response) => response,
        Err(err) => AnthropicErrorResponse::from(err).into_response(),
    }
}

async fn handle(state: &AppState, adapter: &dyn ClientAdapter, body: Value, headers: HeaderMap) -> Result<Response> {
    let stream_requested = body.get("stream").and_then(Value::as_bool).unwrap_or(false);
    let rendered = state.pipeline.handle(adapter, body, &headers).await?;

    if stream_requested {
        let sse = streaming::render_sse(rendered, state.streaming);
        Ok(Sse::new(sse).into_response())
    } else {
        Ok(Json(rendered).into_response())
    }
}
