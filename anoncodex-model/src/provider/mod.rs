//! # LLM Provider Interface
//!
//! A trait-based abstraction over the five supported LLM backends.
//!
//! ## Design
//! - `ProviderAdapter` trait defines the core interface
//! - One adapter per backend: Gemini, OpenAI, Claude, Ollama, LM Studio
//! - `Adapter` is the closed set of those variants behind the same trait;
//!   new backends are added as a variant, never by branching on identity
//!   higher up
//! - Every adapter maps its own envelope to plain text and its own failure
//!   modes to the shared provider `ErrorKind`s (see `http`)

pub mod claude;
pub mod gemini;
pub(crate) mod http;
pub mod lmstudio;
pub mod ollama;
pub mod openai;

pub use claude::ClaudeAdapter;
pub use gemini::GeminiAdapter;
pub use lmstudio::LmStudioAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAIAdapter;

use anoncodex_error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Core Types
// ============================================================================

/// A chat message in the conversation
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

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Request parameters for one generation call.
///
/// Built fresh for every call by the gateway; adapters only read it.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(messages: Vec<ChatMessage>, temperature: f32) -> Self {
        Self {
            messages,
            temperature,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// The system prompt, if the conversation starts with one
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Every message after the leading system prompt
    pub fn turns(&self) -> &[ChatMessage] {
        match self.messages.first() {
            Some(m) if m.role == Role::System => &self.messages[1..],
            _ => &self.messages,
        }
    }
}

/// Outcome of one generation call: the reply text, or an error whose kind
/// is one of the provider kinds.
pub type GenerationResult = Result<String>;

// ============================================================================
// Provider Trait
// ============================================================================

/// The main LLM provider trait
#[allow(async_fn_in_trait)]
pub trait ProviderAdapter: Send + Sync {
    /// Get the provider name (e.g., "openai", "ollama")
    fn name(&self) -> &str;

    /// Get known models
    fn models(&self) -> Vec<String>;

    /// Get the configured model
    fn default_model(&self) -> &str;

    /// Liveness check, issued once at construction time by the gateway.
    /// Cloud providers have nothing cheap to probe and succeed trivially.
    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    /// Send one request and return the top choice's text
    async fn complete(&self, request: &GenerationRequest) -> GenerationResult;
}

// ============================================================================
// Closed set of adapters
// ============================================================================

/// One of the five supported adapters
pub enum Adapter {
    Gemini(GeminiAdapter),
    OpenAI(OpenAIAdapter),
    Claude(ClaudeAdapter),
    Ollama(OllamaAdapter),
    LmStudio(LmStudioAdapter),
}

impl Adapter {
    /// Build the adapter selected by `config.kind`
    pub fn from_config(config: ProviderConfig) -> Result<Self> {
        Ok(match config.kind {
            ProviderKind::Gemini => Adapter::Gemini(GeminiAdapter::new(config)?),
            ProviderKind::OpenAI => Adapter::OpenAI(OpenAIAdapter::new(config)?),
            ProviderKind::Claude => Adapter::Claude(ClaudeAdapter::new(config)?),
            ProviderKind::Ollama => Adapter::Ollama(OllamaAdapter::new(config)?),
            ProviderKind::LmStudio => Adapter::LmStudio(LmStudioAdapter::new(config)?),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Adapter::Gemini(_) => ProviderKind::Gemini,
            Adapter::OpenAI(_) => ProviderKind::OpenAI,
            Adapter::Claude(_) => ProviderKind::Claude,
            Adapter::Ollama(_) => ProviderKind::Ollama,
            Adapter::LmStudio(_) => ProviderKind::LmStudio,
        }
    }
}

impl ProviderAdapter for Adapter {
    fn name(&self) -> &str {
        match self {
            Adapter::Gemini(a) => a.name(),
            Adapter::OpenAI(a) => a.name(),
            Adapter::Claude(a) => a.name(),
            Adapter::Ollama(a) => a.name(),
            Adapter::LmStudio(a) => a.name(),
        }
    }

    fn models(&self) -> Vec<String> {
        match self {
            Adapter::Gemini(a) => a.models(),
            Adapter::OpenAI(a) => a.models(),
            Adapter::Claude(a) => a.models(),
            Adapter::Ollama(a) => a.models(),
            Adapter::LmStudio(a) => a.models(),
        }
    }

    fn default_model(&self) -> &str {
        match self {
            Adapter::Gemini(a) => a.default_model(),
            Adapter::OpenAI(a) => a.default_model(),
            Adapter::Claude(a) => a.default_model(),
            Adapter::Ollama(a) => a.default_model(),
            Adapter::LmStudio(a) => a.default_model(),
        }
    }

    async fn probe(&self) -> Result<()> {
        match self {
            Adapter::Gemini(a) => a.probe().await,
            Adapter::OpenAI(a) => a.probe().await,
            Adapter::Claude(a) => a.probe().await,
            Adapter::Ollama(a) => a.probe().await,
            Adapter::LmStudio(a) => a.probe().await,
        }
    }

    async fn complete(&self, request: &GenerationRequest) -> GenerationResult {
        match self {
            Adapter::Gemini(a) => a.complete(request).await,
            Adapter::OpenAI(a) => a.complete(request).await,
            Adapter::Claude(a) => a.complete(request).await,
            Adapter::Ollama(a) => a.complete(request).await,
            Adapter::LmStudio(a) => a.complete(request).await,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gemini,
    OpenAI,
    Claude,
    Ollama,
    LmStudio,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Gemini,
        ProviderKind::OpenAI,
        ProviderKind::Claude,
        ProviderKind::Ollama,
        ProviderKind::LmStudio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Claude => "claude",
            ProviderKind::Ollama => "ollama",
            ProviderKind::LmStudio => "lm-studio",
        }
    }

    /// Local servers are probed at start-up and need no API key
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::Ollama | ProviderKind::LmStudio)
    }

    pub fn requires_api_key(&self) -> bool {
        !self.is_local()
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::Claude => "https://api.anthropic.com/v1",
            ProviderKind::Ollama => "http://localhost:11434",
            ProviderKind::LmStudio => "http://localhost:1234",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-pro",
            ProviderKind::OpenAI => "gpt-4o",
            ProviderKind::Claude => "claude-3-sonnet-20240229",
            ProviderKind::Ollama => "llama3",
            ProviderKind::LmStudio => "custom",
        }
    }

    /// Known model names for this family
    pub fn known_models(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::Gemini => &["gemini-pro", "gemini-2.5-pro-exp-03-25"],
            ProviderKind::OpenAI => &["gpt-3.5-turbo", "gpt-4", "gpt-4o"],
            ProviderKind::Claude => &[
                "claude-3-7-sonnet-20250219",
                "claude-3-opus-20240229",
                "claude-3-sonnet-20240229",
                "claude-3-haiku-20240307",
                "claude-2.1",
                "claude-2.0",
            ],
            ProviderKind::Ollama => &["llama3", "mistral", "mixtral"],
            ProviderKind::LmStudio => &["custom"],
        }
    }

    /// Guess the provider family from a model name; unknown names fall
    /// back to Gemini.
    pub fn from_model_name(model: &str) -> Self {
        let model = model.trim();
        if model.starts_with("gemini") {
            ProviderKind::Gemini
        } else if model.starts_with("gpt") || model.starts_with("openai") {
            ProviderKind::OpenAI
        } else if model.starts_with("claude") {
            ProviderKind::Claude
        } else if matches!(model, "llama3" | "mistral" | "mixtral") || model.starts_with("ollama") {
            ProviderKind::Ollama
        } else if model == "custom" || model.starts_with("lm-studio") {
            ProviderKind::LmStudio
        } else {
            ProviderKind::Gemini
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" | "gpt" => Ok(ProviderKind::OpenAI),
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            "ollama" => Ok(ProviderKind::Ollama),
            "lm-studio" | "lm_studio" | "lmstudio" => Ok(ProviderKind::LmStudio),
            other => Err(Error::config_invalid(format!("unknown provider '{}'", other))
                .with_context("provider", other)),
        }
    }
}

/// Configuration for creating a provider adapter.
///
/// Built once at process start and passed to `ModelGateway::initialize`.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub default_temperature: f32,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: None,
            base_url: None,
            model: None,
            max_tokens: 4096,
            default_temperature: 0.2,
            request_timeout: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }

    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::new(ProviderKind::Gemini).with_api_key(api_key)
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(ProviderKind::OpenAI).with_api_key(api_key)
    }

    pub fn anthropic(api_key: impl Into<String>) -> Self {
        Self::new(ProviderKind::Claude).with_api_key(api_key)
    }

    /// Local Ollama server, default port 11434
    pub fn ollama() -> Self {
        Self::new(ProviderKind::Ollama)
    }

    /// Local LM Studio server, default port 1234
    pub fn lm_studio() -> Self {
        Self::new(ProviderKind::LmStudio)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
            .trim_end_matches('/')
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or_else(|| self.kind.default_model())
    }

    /// Check that every field the selected provider needs is present
    pub fn validate(&self) -> Result<()> {
        if self.kind.requires_api_key()
            && self.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(Error::config_invalid(format!("{} requires an API key", self.kind))
                .with_operation("config::validate")
                .with_context("provider", self.kind.as_str()));
        }
        if self.base_url().is_empty() {
            return Err(Error::config_invalid("base URL is empty")
                .with_operation("config::validate")
                .with_context("provider", self.kind.as_str()));
        }
        if self.model().trim().is_empty() {
            return Err(Error::config_invalid("model name is empty")
                .with_operation("config::validate")
                .with_context("provider", self.kind.as_str()));
        }
        Ok(())
    }
}

/// Bounded retry for transient provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use anoncodex_error::ErrorKind;

    #[test]
    fn test_chat_message_constructors() {
        let sys = ChatMessage::system("You are helpful");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.content, "You are helpful");

        assert_eq!(ChatMessage::user("Hello").role, Role::User);
        assert_eq!(ChatMessage::assistant("Hi there!").role, Role::Assistant);
    }

    #[test]
    fn test_request_splits_system_prompt() {
        let request = GenerationRequest::new(
            vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            0.7,
        )
        .with_max_tokens(100);

        assert_eq!(request.system_prompt(), Some("sys"));
        assert_eq!(request.turns(), &[ChatMessage::user("hi")]);
        assert_eq!(request.max_tokens, Some(100));

        let request = GenerationRequest::new(vec![ChatMessage::user("hi")], 0.7);
        assert_eq!(request.system_prompt(), None);
        assert_eq!(request.turns().len(), 1);
    }

    #[test]
    fn test_provider_kind_from_model_name() {
        assert_eq!(ProviderKind::from_model_name("gemini-pro"), ProviderKind::Gemini);
        assert_eq!(ProviderKind::from_model_name("gpt-4o"), ProviderKind::OpenAI);
        assert_eq!(ProviderKind::from_model_name("claude-3-opus-20240229"), ProviderKind::Claude);
        assert_eq!(ProviderKind::from_model_name("mixtral"), ProviderKind::Ollama);
        assert_eq!(ProviderKind::from_model_name("ollama/qwen"), ProviderKind::Ollama);
        assert_eq!(ProviderKind::from_model_name("custom"), ProviderKind::LmStudio);
        assert_eq!(ProviderKind::from_model_name("something-else"), ProviderKind::Gemini);
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Claude);
        assert_eq!("LM_STUDIO".parse::<ProviderKind>().unwrap(), ProviderKind::LmStudio);
        let err = "bard".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_provider_config_defaults() {
        let config = ProviderConfig::ollama();
        assert_eq!(config.base_url(), "http://localhost:11434");
        assert_eq!(config.model(), "llama3");
        assert!(config.validate().is_ok());

        let config = ProviderConfig::lm_studio().with_base_url("http://127.0.0.1:1234/");
        assert_eq!(config.base_url(), "http://127.0.0.1:1234");

        let config = ProviderConfig::openai("sk-test").with_model("gpt-4");
        assert_eq!(config.model(), "gpt-4");
        assert_eq!(config.max_tokens, 4096);
    }

    #[test]
    fn test_cloud_provider_requires_key() {
        let err = ProviderConfig::new(ProviderKind::Claude).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let err = ProviderConfig::gemini("  ").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_retry_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(RetryPolicy::none().delay_for(5), Duration::ZERO);
    }
}
