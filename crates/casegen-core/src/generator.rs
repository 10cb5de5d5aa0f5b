//! Text generation seam.
//!
//! The pipeline only ever sees [`TextGenerator`]; [`HttpGenerator`] talks
//! to an OpenAI-compatible chat completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Per-call generation options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub provider: String,
    pub model: String,
    pub track_usage: bool,
}

impl From<&crate::domain::GenerationOptions> for GenerateOptions {
    fn from(options: &crate::domain::GenerationOptions) -> Self {
        Self {
            provider: options.provider.clone(),
            model: options.model.clone(),
            track_usage: options.track_usage,
        }
    }
}

/// Failure of a single generator call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeneratorError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider returned an empty completion")]
    EmptyResponse,

    #[error("generator call timed out after {0} ms")]
    Timeout(u64),

    #[error("provider error: {0}")]
    Provider(String),
}

impl From<reqwest::Error> for GeneratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GeneratorError::Timeout(0)
        } else {
            GeneratorError::Http(err.to_string())
        }
    }
}

/// Produces text for a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        system: &str,
        options: &GenerateOptions,
    ) -> Result<String, GeneratorError>;
}

// ---------------------------------------------------------------------------
// HTTP provider
// ---------------------------------------------------------------------------

/// Connection settings for [`HttpGenerator`].
#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    /// Full chat-completions URL
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Used when the request does not name a model
    pub default_model: String,
    /// Client-side request timeout; the pipeline applies its own per-call limit too
    pub request_timeout: Duration,
}

impl Default for HttpGeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            default_model: "gpt-4o".to_string(),
            request_timeout: Duration::from_secs(180),
        }
    }
}

impl HttpGeneratorConfig {
    /// Read `CASEGEN_LLM_ENDPOINT`, `CASEGEN_LLM_API_KEY` and `CASEGEN_LLM_MODEL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("CASEGEN_LLM_ENDPOINT") {
            config.endpoint = endpoint;
        }
        config.api_key = std::env::var("CASEGEN_LLM_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        if let Ok(model) = std::env::var("CASEGEN_LLM_MODEL") {
            config.default_model = model;
        }
        config
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    error: Option<ProviderErrorBody>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// Chat-completions client.
pub struct HttpGenerator {
    config: HttpGeneratorConfig,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("casegen/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self, GeneratorError> {
        Self::new(HttpGeneratorConfig::from_env())
    }
}

const ERROR_BODY_LIMIT: usize = 500;

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(
        &self,
        prompt: &str,
        system: &str,
        options: &GenerateOptions,
    ) -> Result<String, GeneratorError> {
        let model = if options.model.is_empty() {
            self.config.default_model.as_str()
        } else {
            options.model.as_str()
        };
        let body = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        debug!(provider = %options.provider, model, prompt_chars = prompt.len(), "Calling generator");

        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        if let Some(err) = parsed.error {
            return Err(GeneratorError::Provider(err.message));
        }

        if options.track_usage {
            if let Some(usage) = &parsed.usage {
                info!(
                    event = "generator.usage",
                    provider = %options.provider,
                    model,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    total_tokens = usage.total_tokens,
                );
            }
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GeneratorError::EmptyResponse)
    }
}
