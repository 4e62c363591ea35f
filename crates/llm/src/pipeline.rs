//! Pipeline controller (C6): the state machine sequencing
//! normalize → transform → invoke → transform → render, with bounded retry
//! and synthetic-response short-circuiting (§4.4).

use std::sync::Arc;

use serde_json::Value;
use store::{LogEvent, LogStore};

use crate::{
    client::ClientAdapter,
    error::{LlmError, Result},
    provider::ProviderRegistry,
    router::ModelRouter,
    synthetic::{synthetic_provider_response, synthetic_response},
    transform::{EgressRegistry, IngressRegistry, ProviderRegistry as ProviderTransformRegistry, TransformDeps},
    uir::{ProviderResponse, UirResponse},
};

pub struct PipelineController {
    providers: ProviderRegistry,
    router: ModelRouter,
    ingress: IngressRegistry,
    provider_stage: ProviderTransformRegistry,
    egress: EgressRegistry,
    deps: TransformDeps,
    log_store: Option<Arc<LogStore>>,
}

impl PipelineController {
    pub fn new(
        providers: ProviderRegistry,
        router: ModelRouter,
        ingress: IngressRegistry,
        provider_stage: ProviderTransformRegistry,
        egress: EgressRegistry,
        deps: TransformDeps,
        log_store: Option<Arc<LogStore>>,
    ) -> Self {
        Self { providers, router, ingress, provider_stage, egress, deps, log_store }
    }

    /// Runs one inbound request through the full pipeline and returns the
    /// client-dialect rendered JSON body (§4.4).
    pub async fn handle(&self, adapter: &dyn ClientAdapter, body: Value, headers: &axum::http::HeaderMap) -> Result<Value> {
        let mut request = adapter.to_uir(body, headers)?;

        let alias = request.model.clone();
        let resolved = self.router.resolve(&alias)?;
        request.state.resolved_model = Some(alias);
        request.model = resolved.upstream_model.clone();

        if resolved.ensure_tool_call {
            request.state.ensure_tool_call =
                Some(crate::uir::EnsureToolCallState::new(crate::uir::default_termination_tool_name()));
            request.state.max_attempts = Some(ensure_tool_call_max_attempts());
        } else {
            request.state.max_attempts = Some(1);
        }

        let max_attempts = request.state.max_attempts.unwrap_or(1);
        let provider = self
            .providers
            .get(&resolved.provider_key)
            .ok_or_else(|| LlmError::InvalidConfig(format!("unregistered provider `{}`", resolved.provider_key)))?;

        let mut attempt = 1u32;
        let mut last_provider_response: Option<ProviderResponse> = None;
        let mut rendered: Value;

        loop {
            self.ingress.run(&mut request, &self.deps).await?;

            if request.state.synthetic_requested {
                request.state.synthetic_requested = false;
                let provider_response = synthetic_provider_response();
                let uir_response = synthetic_response(&request);
                rendered = adapter.from_uir(&uir_response, &request);
                last_provider_response = Some(provider_response);
            } else {
                let mut provider_response = provider.invoke(&request, &resolved.overrides).await;

                if provider_response.status >= 400 {
                    self.spawn_log(&request, &resolved, &provider_response, &Value::Null, provider_response.status);
                    request.state.retry_requested = false;
                    return Err(LlmError::ProviderApiError {
                        status: provider_response.status,
                        message: extract_error_message(&provider_response.body),
                    });
                }

                self.provider_stage
                    .run(&mut provider_response.body, &provider_response.headers, &mut request, &self.deps)
                    .await?;

                let mut uir_response = provider.to_uir_response(&provider_response, &request)?;
                self.egress.run(&mut uir_response, &request, &self.deps).await?;
                rendered = adapter.from_uir(&uir_response, &request);
                last_provider_response = Some(provider_response);
            }

            let should_retry = attempt < max_attempts && request.state.retry_requested;
            request.state.retry_requested = false;

            if !should_retry {
                break;
            }

            // Retrying re-runs ingress transforms on the same request (§4.4
            // step f): the reminder is injected into the existing system
            // message by `EnsureToolCallRequestTransform`, not by fabricating
            // a new conversation turn — doing the latter would make the
            // no-tool-call assistant turn just produced look, to the next
            // ingress pass, like a prior turn that should short-circuit to a
            // synthetic response (§4.5's "prior no-tool assistant" check).
            attempt += 1;
        }

        if let Some(provider_response) = &last_provider_response {
            self.spawn_log(&request, &resolved, provider_response, &rendered, provider_response.status);
        }

        Ok(rendered)
    }

    fn spawn_log(
        &self,
        request: &crate::uir::UirRequest,
        resolved: &crate::router::ResolvedModel,
        provider_response: &ProviderResponse,
        rendered: &Value,
        status_code: u16,
    ) {
        let Some(log_store) = self.log_store.clone() else { return };

        let event = LogEvent {
            request_id: request.id.clone(),
            method: "POST".to_owned(),
            url: route_for(request.operation).to_owned(),
            status_code,
            model: request.state.resolved_model.clone().unwrap_or_else(|| request.model.clone()),
            provider: resolved.provider_key.clone(),
            operation: format!("{:?}", request.operation).to_lowercase(),
            request_body: request.metadata.client_request.clone().unwrap_or(Value::Null),
            response_body: rendered.clone(),
            provider_request_body: provider_response.request_body.clone().unwrap_or(Value::Null),
            provider_response_body: provider_response.body.clone(),
        };

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || log_store.append(event)).await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => log::warn!("failed to append log entry: {err}"),
                Err(err) => log::warn!("log append task panicked: {err}"),
            }
        });
    }
}

fn route_for(operation: crate::uir::Operation) -> &'static str {
    match operation {
        crate::uir::Operation::Chat => "/v1/chat/completions",
        crate::uir::Operation::Messages => "/v1/messages",
        crate::uir::Operation::Responses => "/v1/responses",
    }
}

fn extract_error_message(body: &Value) -> String {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| body.to_string())
}

/// `ENSURE_TOOL_CALL_MAX_ATTEMPTS` env var (§6), clamped to `[1, 5]`, default 3.
fn ensure_tool_call_max_attempts() -> u32 {
    std::env::var("ENSURE_TOOL_CALL_MAX_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(3)
        .clamp(1, 5)
}
