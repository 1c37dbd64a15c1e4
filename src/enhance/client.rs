//! Generation client: provider abstraction plus the concrete clients.
//!
//! * `OpenRouterClient` talks to any OpenAI-compatible chat-completions endpoint.
//! * `MockClient` returns a fixed well-formed payload (`AI_TEST_MODE=mock`).
//! * `DisabledClient` refuses every call; the scheduler then serves seeds only.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GenerationSettings;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// One prior exchange shown to the model before the task.
#[derive(Debug, Clone, PartialEq)]
pub struct FewShot {
    pub user: String,
    pub assistant: String,
}

/// System instruction + few-shot examples + task prompt, all plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub examples: Vec<FewShot>,
    pub prompt: String,
    /// Ask the provider for schema-validated JSON where supported.
    pub structured: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    pub text: String,
    /// Provider-reported usage, when available.
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("provider error (HTTP {status_code}): {message}")]
    Status { status_code: u16, message: String },

    #[error("unreadable provider response: {0}")]
    InvalidResponse(String),

    #[error("generation disabled")]
    Disabled,
}

impl GenerationError {
    /// Transient failures worth another attempt. Auth failures and a disabled
    /// client never recover within a batch.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Timeout(_)
            | GenerationError::Network(_)
            | GenerationError::RateLimited
            | GenerationError::InvalidResponse(_) => true,
            GenerationError::Status { status_code, .. } => !matches!(status_code, 401 | 403),
            GenerationError::Disabled => false,
        }
    }
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError>;
    /// Provider name for diagnostics and output metadata.
    fn provider_name(&self) -> &'static str;
    fn is_enabled(&self) -> bool {
        true
    }
}

pub type DynGenerationClient = Arc<dyn GenerationClient>;

/// Factory: build a client according to settings and environment.
///
/// * If `AI_TEST_MODE=mock`, returns the deterministic mock client.
/// * Else if generation is disabled or no API key resolved, returns a disabled client.
/// * Else builds the OpenAI-compatible HTTP client.
pub fn build_client(settings: &GenerationSettings) -> DynGenerationClient {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockClient::default());
    }

    if !settings.enabled || settings.api_key.trim().is_empty() {
        return Arc::new(DisabledClient);
    }

    match settings.provider.as_str() {
        "openrouter" | "openai" => match OpenRouterClient::from_settings(settings) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::warn!(target: "enhance", error = %e, "http client build failed; generation disabled");
                Arc::new(DisabledClient)
            }
        },
        other => {
            tracing::warn!(target: "enhance", provider = other, "unsupported provider; generation disabled");
            Arc::new(DisabledClient)
        }
    }
}

// ------------------------------------------------------------
// OpenAI-compatible HTTP client
// ------------------------------------------------------------

pub struct OpenRouterClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    referer: Option<String>,
    app_title: Option<String>,
    timeout: Duration,
}

impl OpenRouterClient {
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self, GenerationError> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let http = reqwest::Client::builder()
            .user_agent(concat!("news-curator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            referer: settings.referer.clone(),
            app_title: settings.app_title.clone(),
            timeout,
        })
    }
}

// ---- wire types ----

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaWrapper,
}

#[derive(Serialize)]
struct JsonSchemaWrapper {
    name: &'static str,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn build_messages(request: &GenerationRequest) -> Vec<Message<'_>> {
    let mut messages = Vec::with_capacity(2 + request.examples.len() * 2);
    messages.push(Message {
        role: "system",
        content: &request.system,
    });
    for ex in &request.examples {
        messages.push(Message {
            role: "user",
            content: &ex.user,
        });
        messages.push(Message {
            role: "assistant",
            content: &ex.assistant,
        });
    }
    messages.push(Message {
        role: "user",
        content: &request.prompt,
    });
    messages
}

#[async_trait]
impl GenerationClient for OpenRouterClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: build_messages(request),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: request.structured.then(|| ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaWrapper {
                    name: "article_enhancement",
                    strict: true,
                    schema: super::parse::payload_schema(),
                },
            }),
        };

        let mut req = self.http.post(&self.endpoint).bearer_auth(&self.api_key).json(&body);
        if let Some(referer) = &self.referer {
            req = req.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.app_title {
            req = req.header("X-Title", title);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.timeout.as_millis() as u64)
            } else {
                GenerationError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            if status_code == 429 {
                return Err(GenerationError::RateLimited);
            }
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&raw)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| raw.chars().take(200).collect());
            return Err(GenerationError::Status {
                status_code,
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GenerationError::InvalidResponse("empty completion".to_string()))?;

        Ok(GenerationResponse {
            text,
            total_tokens: parsed.usage.and_then(|u| u.total_tokens),
        })
    }

    fn provider_name(&self) -> &'static str {
        "openrouter"
    }
}

// ------------------------------------------------------------
// Disabled + mock
// ------------------------------------------------------------

/// Refuses every call; used when generation is turned off.
pub struct DisabledClient;

#[async_trait]
impl GenerationClient for DisabledClient {
    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        Err(GenerationError::Disabled)
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
    fn is_enabled(&self) -> bool {
        false
    }
}

/// Deterministic mock for local runs.
#[derive(Clone)]
pub struct MockClient {
    pub fixed: String,
}

impl Default for MockClient {
    fn default() -> Self {
        let fixed = serde_json::json!({
            "simplified_title": {"source": "Titre simplifié (mock)", "target": "Simplified title (mock)"},
            "summary": {"source": "Résumé simplifié (mock).", "target": "Simplified summary (mock)."},
            "annotations": [{
                "term": "mock",
                "gloss": "simulé",
                "explanation": "Deterministic output for local runs.",
                "cultural_note": null
            }]
        })
        .to_string();
        Self { fixed }
    }
}

#[async_trait]
impl GenerationClient for MockClient {
    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        Ok(GenerationResponse {
            text: self.fixed.clone(),
            total_tokens: None,
        })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_by_kind() {
        assert!(GenerationError::Timeout(30_000).is_retryable());
        assert!(GenerationError::RateLimited.is_retryable());
        assert!(GenerationError::Status {
            status_code: 502,
            message: "bad gateway".into()
        }
        .is_retryable());
        assert!(!GenerationError::Status {
            status_code: 401,
            message: "no key".into()
        }
        .is_retryable());
        assert!(!GenerationError::Disabled.is_retryable());
    }

    #[test]
    fn messages_interleave_examples_before_task() {
        let req = GenerationRequest {
            system: "sys".into(),
            examples: vec![FewShot {
                user: "u1".into(),
                assistant: "a1".into(),
            }],
            prompt: "task".into(),
            structured: false,
        };
        let roles: Vec<_> = build_messages(&req).iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    }

    #[tokio::test]
    async fn disabled_client_refuses() {
        let c = DisabledClient;
        assert!(!c.is_enabled());
        let req = GenerationRequest {
            system: String::new(),
            examples: vec![],
            prompt: String::new(),
            structured: false,
        };
        assert_eq!(c.generate(&req).await, Err(GenerationError::Disabled));
    }
}
