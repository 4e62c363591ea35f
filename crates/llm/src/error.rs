use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::client::anthropic_messages;

pub type Result<T> = std::result::Result<T, LlmError>;

/// Pipeline errors, mapped onto the "Kinds" of §7.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing adapter, unset `$VAR`, unregistered `clientFormat`/`providerKey`.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed client request that tolerant parsing could not salvage.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Provider adapter could not reach the upstream at all.
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// Upstream responded with `status >= 400`.
    #[error("provider API error ({status}): {message}")]
    ProviderApiError { status: u16, message: String },

    /// Normalization failed schema validation even after the Kimi fixer ran.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// A transform raised during a pipeline attempt.
    #[error("transform '{transform}' failed at stage '{stage}': {message}")]
    TransformFailed {
        stage: &'static str,
        transform: &'static str,
        message: String,
    },

    /// Model alias did not resolve to any configured provider.
    #[error("model '{0}' is not configured")]
    ModelNotFound(String),
}

impl LlmError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ModelNotFound(_) => StatusCode::NOT_FOUND,
            Self::ConnectionError(_) => StatusCode::BAD_GATEWAY,
            Self::ProviderApiError { status, .. } => match *status {
                400 => StatusCode::BAD_REQUEST,
                401 => StatusCode::UNAUTHORIZED,
                403 => StatusCode::FORBIDDEN,
                404 => StatusCode::NOT_FOUND,
                429 => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            Self::TransformFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ModelNotFound(_) => "not_found",
            Self::ConnectionError(_) | Self::ProviderApiError { .. } => "api_error",
            Self::InvalidResponse(_) => "invalid_response",
            Self::TransformFailed { .. } => "internal_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: String,
    code: String,
}

impl IntoResponse for LlmError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code().to_owned();
        let message = self.to_string();

        let body = ErrorResponse {
            error: ErrorDetails {
                message,
                r#type: "api_error".to_owned(),
                code,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Anthropic-dialect error envelope for the `/v1/messages` route.
pub struct AnthropicErrorResponse {
    status: StatusCode,
    body: anthropic_messages::AnthropicErrorBody,
}

impl From<LlmError> for AnthropicErrorResponse {
    fn from(error: LlmError) -> Self {
        let status = error.status_code();
        let body = anthropic_messages::AnthropicErrorBody::from(&error);
        Self { status, body }
    }
}

impl IntoResponse for AnthropicErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type AnthropicApiResult<T> = std::result::Result<T, AnthropicErrorResponse>;

#[cfg(test)]
mod tests {
    use axum::{
        body::to_bytes,
        http::StatusCode,
        response::{IntoResponse as _, Response},
    };
    use insta::assert_json_snapshot;

    use super::{AnthropicErrorResponse, LlmError};

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_codes_map_per_kind() {
        assert_eq!(LlmError::InvalidConfig("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(LlmError::InvalidRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(LlmError::ModelNotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(LlmError::ConnectionError("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(LlmError::ProviderApiError { status: 401, message: "x".into() }.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(LlmError::ProviderApiError { status: 500, message: "x".into() }.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(LlmError::InvalidResponse("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            LlmError::TransformFailed { stage: "ingress", transform: "t", message: "x".into() }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn provider_api_error_renders_the_openai_style_envelope() {
        let error = LlmError::ProviderApiError { status: 429, message: "rate limited".to_owned() };
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_json_snapshot!(body_json(response).await, @r#"
        {
          "error": {
            "code": "api_error",
            "message": "provider API error (429): rate limited",
            "type": "api_error"
          }
        }
        "#);
    }

    #[tokio::test]
    async fn model_not_found_renders_the_anthropic_style_envelope() {
        let error = LlmError::ModelNotFound("ghost-model".to_owned());
        let response = AnthropicErrorResponse::from(error).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_json_snapshot!(body_json(response).await, @r#"
        {
          "error": {
            "message": "model 'ghost-model' is not configured",
            "type": "not_found"
          },
          "type": "error"
        }
        "#);
    }
}
