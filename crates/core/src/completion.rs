//! Completion Service
//!
//! The tutoring engine talks to a large language model through one narrow
//! interface: a prompt goes in, raw text comes out. Everything returned here is
//! untrusted and callers are expected to parse it leniently.
//!
//! Two implementations are provided: [`OpenAICompletionService`] for any
//! OpenAI-compatible endpoint, and [`StubCompletionService`] for offline use,
//! which answers every request with [`CompletionError::Unavailable`].

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat},
};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::time::Duration;
use tracing::debug;

/// Per-request tuning knobs forwarded to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    /// Ask the provider to constrain output to a JSON object.
    pub json_mode: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn json() -> Self {
        Self {
            json_mode: true,
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Reasons a completion could not be obtained.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// No completion backend is available (stub/offline mode).
    #[error("Completion service is unavailable")]
    Unavailable,
    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),
    #[error("Completion request failed: {0}")]
    Request(#[from] OpenAIError),
    #[error("Completion response had no content")]
    Empty,
}

/// Defines the contract for any text-generation backend used by the engine.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Sends a single prompt and returns the raw text of the model's reply.
    async fn complete(
        &self,
        prompt: &str,
        options: CompletionOptions,
    ) -> Result<String, CompletionError>;
}

/// Runs `service.complete` but gives up once `timeout` elapses.
pub async fn complete_within(
    service: &dyn CompletionService,
    prompt: &str,
    options: CompletionOptions,
    timeout: Duration,
) -> Result<String, CompletionError> {
    match tokio::time::timeout(timeout, service.complete(prompt, options)).await {
        Ok(result) => result,
        Err(_elapsed) => {
            debug!(?timeout, "completion call timed out");
            Err(CompletionError::Timeout(timeout))
        }
    }
}

/// A `CompletionService` backed by any OpenAI-compatible chat completions API.
pub struct OpenAICompletionService {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompletionService {
    /// Creates a new client.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL for the provider.
    /// * `model` - Model identifier to use for chat completions (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAICompletionService {
    async fn complete(
        &self,
        prompt: &str,
        options: CompletionOptions,
    ) -> Result<String, CompletionError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into(),
        ]);
        if options.json_mode {
            builder.response_format(ResponseFormat::JsonObject);
        }
        if let Some(temperature) = options.temperature {
            builder.temperature(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            builder.max_completion_tokens(max_tokens);
        }
        let request = builder.build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CompletionError::Empty)
    }
}

/// Offline `CompletionService`. Every call reports that no completion is
/// available so callers take their fallback paths immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubCompletionService;

#[async_trait]
impl CompletionService for StubCompletionService {
    async fn complete(
        &self,
        _prompt: &str,
        _options: CompletionOptions,
    ) -> Result<String, CompletionError> {
        Err(CompletionError::Unavailable)
    }
}
