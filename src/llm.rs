//! LLM completion client.
//!
//! Defines the [`CompletionProvider`] trait and two HTTP backends:
//!
//! - **OpenAI** — `POST /v1/chat/completions`; requires `OPENAI_API_KEY`.
//! - **Ollama** — a local instance's `/api/chat` endpoint. Intended for
//!   privacy-sensitive corpora where case text must not leave the machine.
//!
//! Connect timeout is 60 s; the read timeout comes from the request and is
//! capped at [`MAX_TIMEOUT_SECS`]. Any transport failure or timeout
//! surfaces as [`Error::LlmUnavailable`]; callers degrade to a
//! deterministic listing of retrieval hits rather than failing the user.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Hard cap on per-call read timeouts.
pub const MAX_TIMEOUT_SECS: u64 = 180;

/// One completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, config: &LlmConfig) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs.min(MAX_TIMEOUT_SECS)),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs.min(MAX_TIMEOUT_SECS));
        self
    }
}

/// Trait for black-box completion providers.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Create the configured [`CompletionProvider`].
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompletion::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaCompletion::new(config))),
        other => Err(Error::Config(format!("Unknown LLM provider: {}", other))),
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

// ============ OpenAI Provider ============

pub struct OpenAiCompletion {
    model: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

impl OpenAiCompletion {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(Error::Config(
                "OPENAI_API_KEY environment variable not set".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Request(e.to_string()))?;
        Ok(Self {
            model: config.model.clone(),
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Config("OPENAI_API_KEY not set".into()))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [ChatMessage {
                role: "user".into(),
                content: request.prompt.clone(),
            }],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| Error::LlmUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::LlmUnavailable(format!(
                "OpenAI API error {}: {}",
                status, text
            )));
        }

        let parsed: OpenAiChatResponse = resp
            .json()
            .await
            .map_err(|e| Error::LlmUnavailable(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::LlmUnavailable("empty completion response".into()))
    }
}

// ============ Ollama Provider ============

pub struct OllamaCompletion {
    model: String,
    url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

impl OllamaCompletion {
    pub fn new(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            client,
        }
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [ChatMessage {
                role: "user".into(),
                content: request.prompt.clone(),
            }],
            "stream": false,
            "options": {
                "num_predict": request.max_tokens,
                "temperature": request.temperature,
            },
        });

        let resp = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                Error::LlmUnavailable(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::LlmUnavailable(format!(
                "Ollama API error {}: {}",
                status, text
            )));
        }

        let parsed: OllamaChatResponse = resp
            .json()
            .await
            .map_err(|e| Error::LlmUnavailable(e.to_string()))?;
        Ok(parsed.message.content)
    }
}

pub mod testing {
    //! Scripted completion provider for tests and offline smoke runs.

    use super::*;
    use std::sync::Mutex;

    /// Returns canned responses in order; errors once the script runs out
    /// or when constructed with [`MockCompletion::unavailable`].
    pub struct MockCompletion {
        responses: Mutex<Vec<String>>,
        fail: bool,
    }

    impl MockCompletion {
        pub fn scripted(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
                fail: false,
            }
        }

        pub fn unavailable() -> Self {
            Self {
                responses: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for MockCompletion {
        fn model_name(&self) -> &str {
            "mock-completion"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            if self.fail {
                return Err(Error::LlmUnavailable("mock provider set to fail".into()));
            }
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| Error::LlmUnavailable("mock script exhausted".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockCompletion;
    use super::*;

    #[test]
    fn test_request_timeout_capped() {
        let config = LlmConfig::default();
        let req = CompletionRequest::new("p", &config).with_timeout(600);
        assert_eq!(req.timeout, Duration::from_secs(MAX_TIMEOUT_SECS));
    }

    #[test]
    fn test_create_provider_rejects_unknown() {
        let mut config = LlmConfig::default();
        config.provider = "telepathy".into();
        assert!(create_provider(&config).is_err());
    }

    #[tokio::test]
    async fn test_mock_scripted_responses() {
        let provider = MockCompletion::scripted(vec!["first", "second"]);
        let req = CompletionRequest::new("p", &LlmConfig::default());
        assert_eq!(provider.complete(&req).await.unwrap(), "first");
        assert_eq!(provider.complete(&req).await.unwrap(), "second");
        assert!(matches!(
            provider.complete(&req).await.unwrap_err(),
            Error::LlmUnavailable(_)
        ));
    }
}
