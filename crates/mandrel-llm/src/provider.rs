//! LLM provider trait.
//!
//! Defines the interface the conversation loop consumes. The concrete HTTP
//! clients that implement this trait for a specific vendor API are out of
//! scope for this crate — callers bring their own `LlmProvider`.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::LlmResult;
use crate::types::{LlmResponse, LlmToolDefinition, Message, StreamEvent};

/// Type alias for boxed streams.
pub type StreamBox = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

/// A single call to a language model, carrying everything the conversation
/// loop assembled for this round: the (possibly fidelity-reduced) message
/// history, the tool roster, the system prompt, and provider-routing hints.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model to use for this call.
    pub model: String,
    /// Conversation messages, system message first.
    pub messages: Vec<Message>,
    /// Tool definitions available this round.
    pub tools: Vec<LlmToolDefinition>,
    /// Reasoning-effort hint (e.g. "low"/"medium"/"high"); provider-specific.
    pub reasoning_effort: Option<String>,
    /// Identifier of the provider profile that built this request.
    pub provider_id: String,
    /// Free-form provider-specific options (e.g. top_p, safety settings).
    pub provider_options: serde_json::Value,
}

impl LlmRequest {
    /// Build a request for the given model and messages with no tools and
    /// no provider-specific options.
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            reasoning_effort: None,
            provider_id: String::new(),
            provider_options: serde_json::Value::Null,
        }
    }

    /// Set the tool roster.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<LlmToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the reasoning-effort hint.
    #[must_use]
    pub fn with_reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }

    /// Set the provider id this request is routed to.
    #[must_use]
    pub fn with_provider_id(mut self, id: impl Into<String>) -> Self {
        self.provider_id = id.into();
        self
    }

    /// Set provider-specific options.
    #[must_use]
    pub fn with_provider_options(mut self, options: serde_json::Value) -> Self {
        self.provider_options = options;
        self
    }
}

/// LLM provider trait.
///
/// Implementors provide access to language models with streaming support.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the model being used.
    fn model(&self) -> &str;

    /// Stream a completion.
    ///
    /// Returns a stream of events as the model generates output.
    async fn stream(&self, request: &LlmRequest) -> LlmResult<StreamBox>;

    /// Complete without streaming.
    ///
    /// Returns the full response once generation is complete.
    async fn complete(&self, request: &LlmRequest) -> LlmResult<LlmResponse>;

    /// Simple text completion (no tools).
    async fn complete_simple(&self, prompt: &str) -> LlmResult<String> {
        let request = LlmRequest::new(self.model(), vec![Message::user(prompt)]);
        let response = self.complete(&request).await?;
        Ok(response.message.text().unwrap_or("").to_string())
    }

    /// Count tokens in text (approximate).
    fn count_tokens(&self, text: &str) -> usize {
        // Rough approximation: ~4 chars per token
        text.len() / 4
    }

    /// Get maximum context length.
    fn max_context_length(&self) -> usize;
}

/// Blanket implementation allowing `Box<dyn LlmProvider>` to be used as
/// a type parameter wherever `P: LlmProvider` is required.
#[async_trait]
impl LlmProvider for Box<dyn LlmProvider> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    async fn stream(&self, request: &LlmRequest) -> LlmResult<StreamBox> {
        (**self).stream(request).await
    }

    async fn complete(&self, request: &LlmRequest) -> LlmResult<LlmResponse> {
        (**self).complete(request).await
    }

    fn count_tokens(&self, text: &str) -> usize {
        (**self).count_tokens(text)
    }

    fn max_context_length(&self) -> usize {
        (**self).max_context_length()
    }
}

/// Configuration for LLM providers.
#[derive(Clone)]
pub struct ProviderConfig {
    /// API key.
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: usize,
    /// Temperature (0.0 - 1.0).
    pub temperature: f64,
    /// API base URL (for custom endpoints).
    pub base_url: Option<String>,
    /// Context window size override. When set, the provider uses this instead
    /// of its built-in default for the model.
    pub context_window: Option<usize>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("has_api_key", &!self.api_key.is_empty())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("has_base_url", &self.base_url.is_some())
            .field("context_window", &self.context_window)
            .finish()
    }
}

impl ProviderConfig {
    /// Create a new config with API key and model.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
            temperature: 0.7,
            base_url: None,
            context_window: None,
        }
    }

    /// Set max tokens.
    #[must_use]
    pub fn max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    /// Set temperature.
    #[must_use]
    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = temp.clamp(0.0, 1.0);
        self
    }

    /// Set base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set context window size override.
    #[must_use]
    pub fn context_window(mut self, size: usize) -> Self {
        self.context_window = Some(size);
        self
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "default-model".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            base_url: None,
            context_window: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_config_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.max_tokens, 4096);
        assert!((config.temperature - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn provider_config_debug_redacts_api_key() {
        let config = ProviderConfig::new("super-secret", "model-x");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("has_api_key: true"));
    }

    #[test]
    fn llm_request_builder() {
        let req = LlmRequest::new("model-x", vec![Message::user("hi")])
            .with_reasoning_effort("high")
            .with_provider_id("anthropic-like");
        assert_eq!(req.reasoning_effort.as_deref(), Some("high"));
        assert_eq!(req.provider_id, "anthropic-like");
    }
}
