//! Transform stage registry (C4): ordered pre/post-conversion and response
//! transforms with priorities. Each stage's transforms are sorted once at
//! registry construction by ascending `priority`, with ties broken by
//! registration order (`Vec::sort_by_key` is stable, so pushing in
//! registration order and sorting once is enough to satisfy that tiebreak).

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::Result, signature_cache::SignatureCache, uir::UirRequest, uir::UirResponse};

/// Shared collaborators every transform stage may need, independent of
/// which stage they run at.
pub struct TransformDeps {
    pub signature_cache: Arc<dyn SignatureCache>,
}

pub struct IngressCtx<'a> {
    pub request: &'a mut UirRequest,
}

/// Raw provider response body, pre-`toUIRResponse` conversion (§4.2, §4.5).
pub struct ProviderCtx<'a> {
    pub body: &'a mut Value,
    pub headers: &'a HashMap<String, String>,
    pub request: &'a mut UirRequest,
}

pub struct EgressCtx<'a> {
    pub response: &'a mut UirResponse,
    pub request: &'a UirRequest,
}

#[async_trait]
pub trait IngressTransform: Send + Sync {
    fn name(&self) -> &'static str;
    fn priority(&self) -> i32;
    fn applies(&self, ctx: &IngressCtx<'_>) -> bool;
    async fn transform(&self, ctx: &mut IngressCtx<'_>, deps: &TransformDeps) -> Result<()>;
}

#[async_trait]
pub trait ProviderTransform: Send + Sync {
    fn name(&self) -> &'static str;
    fn priority(&self) -> i32;
    fn applies(&self, ctx: &ProviderCtx<'_>) -> bool;
    async fn transform(&self, ctx: &mut ProviderCtx<'_>, deps: &TransformDeps) -> Result<()>;
}

#[async_trait]
pub trait EgressTransform: Send + Sync {
    fn name(&self) -> &'static str;
    fn priority(&self) -> i32;
    fn applies(&self, ctx: &EgressCtx<'_>) -> bool;
    async fn transform(&self, ctx: &mut EgressCtx<'_>, deps: &TransformDeps) -> Result<()>;
}

pub struct IngressRegistry(Vec<Box<dyn IngressTransform>>);
pub struct ProviderRegistry(Vec<Box<dyn ProviderTransform>>);
pub struct EgressRegistry(Vec<Box<dyn EgressTransform>>);

impl IngressRegistry {
    pub fn new(mut transforms: Vec<Box<dyn IngressTransform>>) -> Self {
        transforms.sort_by_key(|t| t.priority());
        Self(transforms)
    }

    pub async fn run(&self, request: &mut UirRequest, deps: &TransformDeps) -> Result<()> {
        for transform in &self.0 {
            let mut ctx = IngressCtx { request };
            if !transform.applies(&ctx) {
                continue;
            }
            transform.transform(&mut ctx, deps).await.map_err(|err| {
                crate::error::LlmError::TransformFailed {
                    stage: "ingress",
                    transform: transform.name(),
                    message: err.to_string(),
                }
            })?;
        }
        Ok(())
    }
}

impl ProviderRegistry {
    pub fn new(mut transforms: Vec<Box<dyn ProviderTransform>>) -> Self {
        transforms.sort_by_key(|t| t.priority());
        Self(transforms)
    }

    pub async fn run(
        &self,
        body: &mut Value,
        headers: &HashMap<String, String>,
        request: &mut UirRequest,
        deps: &TransformDeps,
    ) -> Result<()> {
        for transform in &self.0 {
            let mut ctx = ProviderCtx { body, headers, request };
            if !transform.applies(&ctx) {
                continue;
            }
            transform.transform(&mut ctx, deps).await.map_err(|err| {
                crate::error::LlmError::TransformFailed {
                    stage: "provider",
                    transform: transform.name(),
                    message: err.to_string(),
                }
            })?;
        }
        Ok(())
    }
}

impl EgressRegistry {
    pub fn new(mut transforms: Vec<Box<dyn EgressTransform>>) -> Self {
        transforms.sort_by_key(|t| t.priority());
        Self(transforms)
    }

    pub async fn run(&self, response: &mut UirResponse, request: &UirRequest, deps: &TransformDeps) -> Result<()> {
        for transform in &self.0 {
            let mut ctx = EgressCtx { response, request };
            if !transform.applies(&ctx) {
                continue;
            }
            transform.transform(&mut ctx, deps).await.map_err(|err| {
                crate::error::LlmError::TransformFailed {
                    stage: "egress",
                    transform: transform.name(),
                    message: err.to_string(),
                }
            })?;
        }
        Ok(())
    }
}

pub fn is_synthetic_headers(headers: &HashMap<String, String>) -> bool {
    headers.get("x-synthetic-response").map(String::as_str) == Some("true")
}
