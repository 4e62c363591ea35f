//! Vertex AI Model-as-a-Service: the OpenAI-compatible wire format routed
//! over a GCP endpoint, authenticated with a service-account-signed JWT
//! exchanged for a bearer token (§4.2 "Vertex MaaS routing").

use std::{
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use toml::Table;

use crate::{
    error::{LlmError, Result},
    provider::{ProviderAdapter, http_client, openai},
    uir::{ProviderResponse, UirRequest, UirResponse},
};

const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const TOKEN_LIFETIME_SECS: u64 = 3600;

/// Models that are only ever served from the `global` location, regardless
/// of the configured region, identified by a `-maas` suffix or by name.
const GLOBAL_ONLY_MODELS: &[&str] = &["gemini-3-pro-preview"];

#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    TOKEN_URI.to_owned()
}

#[derive(Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

struct CachedToken {
    token: String,
    expires_at: u64,
}

pub struct VertexProvider {
    client: reqwest::Client,
    project_id: String,
    location: String,
    service_account: ServiceAccountKey,
    endpoint_override: Option<String>,
    cached_token: Mutex<Option<CachedToken>>,
}

impl VertexProvider {
    pub fn new(
        project_id: String,
        location: String,
        credentials: Option<SecretString>,
        credentials_path: Option<String>,
        endpoint_override: Option<String>,
    ) -> Result<Self> {
        let raw = match (credentials, credentials_path) {
            (Some(inline), _) => inline.expose_secret().to_owned(),
            (None, Some(path)) => std::fs::read_to_string(&path)
                .map_err(|err| LlmError::InvalidConfig(format!("reading vertex credentials at {path}: {err}")))?,
            (None, None) => {
                return Err(LlmError::InvalidConfig("vertex provider requires credentials or credentialsPath".into()));
            }
        };

        let service_account: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|err| LlmError::InvalidConfig(format!("parsing vertex service account key: {err}")))?;

        Ok(Self {
            client: http_client::http_client(),
            project_id,
            location,
            service_account,
            endpoint_override,
            cached_token: Mutex::new(None),
        })
    }

    async fn bearer_token(&self) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();

        if let Some(cached) = self.cached_token.lock().expect("token cache lock poisoned").as_ref() {
            if cached.expires_at > now + 60 {
                return Ok(cached.token.clone());
            }
        }

        let claims = JwtClaims {
            iss: self.service_account.client_email.clone(),
            scope: SCOPE.to_owned(),
            aud: self.service_account.token_uri.clone(),
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(self.service_account.private_key.as_bytes())
            .map_err(|err| LlmError::InvalidConfig(format!("invalid vertex service account key: {err}")))?;
        let jwt = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|err| LlmError::InvalidConfig(format!("signing vertex JWT: {err}")))?;

        let response = self
            .client
            .post(&self.service_account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await
            .map_err(|err| LlmError::ConnectionError(err.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::ProviderApiError {
                status: response.status().as_u16(),
                message: "vertex token exchange failed".into(),
            });
        }

        let token: TokenResponse =
            response.json().await.map_err(|err| LlmError::InvalidResponse(format!("vertex token response: {err}")))?;

        *self.cached_token.lock().expect("token cache lock poisoned") =
            Some(CachedToken { token: token.access_token.clone(), expires_at: now + TOKEN_LIFETIME_SECS });

        Ok(token.access_token)
    }

    /// Whether `model` is served only from the `global` location (§4.2
    /// "model-id-based endpoint routing").
    fn is_global_only(model: &str) -> bool {
        model.ends_with("-maas") || GLOBAL_ONLY_MODELS.contains(&model)
    }

    fn endpoint_for(&self, model: &str) -> (String, String) {
        Self::endpoint_for_location(model, &self.location)
    }

    fn endpoint_for_location(model: &str, location: &str) -> (String, String) {
        if Self::is_global_only(model) {
            ("global".to_owned(), "https://aiplatform.googleapis.com".to_owned())
        } else {
            (location.to_owned(), format!("https://{location}-aiplatform.googleapis.com"))
        }
    }

    /// Maps a client-visible Gemini alias onto the publisher-qualified model
    /// id Vertex expects (e.g. `gemini-3-pro-preview` -> `google/gemini-3-pro-preview`).
    fn normalize_model_id(model: &str) -> String {
        if model.contains('/') { model.to_owned() } else { format!("google/{model}") }
    }
}

#[async_trait]
impl ProviderAdapter for VertexProvider {
    fn key(&self) -> &'static str {
        "vertex"
    }

    async fn invoke(&self, request: &UirRequest, overrides: &Table) -> ProviderResponse {
        let token = match self.bearer_token().await {
            Ok(token) => token,
            Err(err) => {
                return ProviderResponse {
                    status: 502,
                    headers: Default::default(),
                    body: json!({ "error": { "message": err.to_string(), "type": "connection_error" } }),
                    request_body: None,
                };
            }
        };

        let mut body = openai::build_request_body(request);
        body["model"] = json!(Self::normalize_model_id(&request.model));

        let (location, base_host) = self.endpoint_for(&request.model);
        let base_url = overrides
            .get("endpoint_override")
            .and_then(toml::Value::as_str)
            .map(str::to_owned)
            .or_else(|| self.endpoint_override.clone())
            .unwrap_or(base_host);

        let url =
            format!("{base_url}/v1/projects/{}/locations/{location}/endpoints/openapi/chat/completions", self.project_id);

        openai::send(&self.client, &url, &token, body).await
    }

    fn to_uir_response(&self, response: &ProviderResponse, request: &UirRequest) -> Result<UirResponse> {
        openai::normalize_response(&response.body, request)
    }
}

#[cfg(test)]
mod tests {
    use super::VertexProvider;

    #[test]
    fn routes_global_only_model_to_the_global_endpoint() {
        let (location, base_host) = VertexProvider::endpoint_for_location("gemini-3-pro-preview", "us-central1");

        assert_eq!(location, "global");
        assert_eq!(base_host, "https://aiplatform.googleapis.com");
    }

    #[test]
    fn routes_regional_model_to_its_configured_location() {
        let (location, base_host) = VertexProvider::endpoint_for_location("gemini-2.0-flash", "us-central1");

        assert_eq!(location, "us-central1");
        assert_eq!(base_host, "https://us-central1-aiplatform.googleapis.com");
    }

    #[test]
    fn normalizes_bare_model_id_to_a_publisher_qualified_one() {
        assert_eq!(VertexProvider::normalize_model_id("gemini-3-pro-preview"), "google/gemini-3-pro-preview");
        assert_eq!(VertexProvider::normalize_model_id("google/gemini-3-pro-preview"), "google/gemini-3-pro-preview");
    }
}
