//! Completion client
//!
//! Abstraction over the text-generation service plus an HTTP implementation
//! for OpenAI-compatible `chat/completions` endpoints.
//!
//! Credentials are never read from process state here: every request carries
//! the key snapshot taken by the caller at call time.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use dcmp_common::config::ProviderConfig;
use dcmp_common::ApiKey;

use crate::preview::{truncate_chars, RAW_RESPONSE_PREVIEW_CHARS};

/// Failure during the round trip to the generation service
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Transport failure (connect, timeout, TLS, ...)
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Service answered with a non-success status; `body` is truncated
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// No API key set for the provider
    #[error("no API key configured for provider '{0}'")]
    MissingCredential(String),

    /// Response contained no generated choice
    #[error("provider response contained no choices")]
    EmptyResponse,

    /// Response body could not be decoded
    #[error("failed to decode provider response: {0}")]
    Serialization(String),
}

/// Chat role of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Requested output shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonObject,
}

/// One generation request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature in [0, 1]
    pub temperature: f32,
    pub response_format: ResponseFormat,
    /// Credential snapshot for this request only
    pub api_key: Option<ApiKey>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ProviderError {
    /// Non-success status, keeping only a preview of the response body
    pub fn status(status: u16, body: &str) -> Self {
        ProviderError::Status {
            status,
            body: truncate_chars(body, RAW_RESPONSE_PREVIEW_CHARS),
        }
    }
}

impl CompletionResponse {
    /// Build a single-choice response
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: Some(text.into()),
                },
            }],
        }
    }

    /// Text of the first generated choice
    pub fn first_text(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref()
    }
}

/// Generation service interface
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Issue one completion request
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, ProviderError>;

    /// Low-cost probe confirming that `key` is accepted by the provider
    async fn check_key(&self, key: &ApiKey) -> Result<(), ProviderError>;
}

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    response_format: ResponseFormat,
}

/// OpenAI-compatible HTTP client
pub struct HttpCompletionClient {
    http_client: Client,
    provider: String,
    base_url: String,
}

impl HttpCompletionClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("dcmp-ai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        Ok(Self {
            http_client,
            provider: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn bearer(key: &ApiKey) -> Result<header::HeaderValue, ProviderError> {
        header::HeaderValue::from_str(&format!("Bearer {}", key.expose()))
            .map_err(|_| {
                ProviderError::Http("API key contains invalid header characters".to_string())
            })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let key = request
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::MissingCredential(self.provider.clone()))?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequestBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            response_format: request.response_format,
        };

        debug!(url = %url, model = %request.model, "Sending completion request");

        let response = self
            .http_client
            .post(&url)
            .header(header::AUTHORIZATION, Self::bearer(key)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::status(status, &body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        let parsed: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Serialization(e.to_string()))?;

        debug!(choices = parsed.choices.len(), "Completion response received");

        Ok(parsed)
    }

    async fn check_key(&self, key: &ApiKey) -> Result<(), ProviderError> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .header(header::AUTHORIZATION, Self::bearer(key)?)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        debug!(status_code = status.as_u16(), "Provider key check response");

        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::status(status.as_u16(), &body))
        }
    }
}

/// Client returning canned outputs in order, recording every request
///
/// Used by tests and local demos in place of a live provider.
#[derive(Default)]
pub struct ScriptedCompletionClient {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    accepted_key: Option<String>,
}

impl ScriptedCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful text output
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_result(Ok(text.into()))
    }

    /// Queue a provider failure
    pub fn with_error(self, error: ProviderError) -> Self {
        self.with_result(Err(error))
    }

    fn with_result(mut self, result: Result<String, ProviderError>) -> Self {
        self.responses.get_mut().push_back(result);
        self
    }

    /// Only `key` passes [`CompletionClient::check_key`]
    pub fn accepting_key(mut self, key: impl Into<String>) -> Self {
        self.accepted_key = Some(key.into());
        self
    }

    /// Every request issued so far
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.requests.lock().await.push(request);
        match self.responses.lock().await.pop_front() {
            Some(Ok(text)) => Ok(CompletionResponse::from_text(text)),
            Some(Err(e)) => Err(e),
            None => Ok(CompletionResponse::default()),
        }
    }

    async fn check_key(&self, key: &ApiKey) -> Result<(), ProviderError> {
        match &self.accepted_key {
            Some(accepted) if accepted == key.expose() => Ok(()),
            _ => Err(ProviderError::Status {
                status: 401,
                body: "invalid api key".to_string(),
            }),
        }
    }
}
