//! ModelGateway: the single entry point the controllers talk to.
//!
//! Holds exactly one adapter, shapes every conversation the same way before
//! it reaches a provider, and owns the bounded retry for transient failures.

use crate::provider::{
    Adapter, ChatMessage, GenerationRequest, GenerationResult, ProviderAdapter, ProviderConfig,
    ProviderKind, RetryPolicy, Role,
};
use anoncodex_error::{Error, Result};
use tracing::{debug, info, warn};

/// Lowest and highest temperature accepted by every provider
pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);

/// Filler turn inserted when a conversation would open with the assistant
const CONTINUE_PROMPT: &str = "Continue.";

/// What the controllers need from a model.
///
/// `ModelGateway` is the production implementation; tests script their own.
#[allow(async_fn_in_trait)]
pub trait ChatModel {
    /// Multi-turn generation
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> GenerationResult;

    /// Temperature to use when the caller has no opinion
    fn default_temperature(&self) -> f32 {
        0.2
    }

    /// Single-turn convenience over `chat`
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> GenerationResult {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.trim().is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        messages.push(ChatMessage::user(user_prompt));
        self.chat(&messages, temperature).await
    }
}

impl<M: ChatModel + ?Sized> ChatModel for &M {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> GenerationResult {
        (**self).chat(messages, temperature).await
    }

    fn default_temperature(&self) -> f32 {
        (**self).default_temperature()
    }
}

/// Gateway over one configured provider
pub struct ModelGateway {
    adapter: Adapter,
    max_tokens: u32,
    default_temperature: f32,
    retry: RetryPolicy,
}

impl ModelGateway {
    /// Validate `config`, build the adapter and, for local servers, probe
    /// that something is listening.
    pub async fn initialize(config: ProviderConfig) -> Result<Self> {
        config.validate()?;

        let max_tokens = config.max_tokens;
        let default_temperature = clamp_temperature(config.default_temperature);
        let retry = config.retry;
        let adapter = Adapter::from_config(config)?;

        if adapter.kind().is_local() {
            debug!(provider = adapter.name(), "probing local server");
            adapter
                .probe()
                .await
                .map_err(|e| e.with_operation("gateway::initialize"))?;
        }

        info!(
            provider = adapter.name(),
            model = adapter.default_model(),
            "model gateway ready"
        );

        Ok(Self {
            adapter,
            max_tokens,
            default_temperature,
            retry,
        })
    }

    pub fn provider(&self) -> ProviderKind {
        self.adapter.kind()
    }

    pub fn model(&self) -> &str {
        self.adapter.default_model()
    }

    /// Known model names for the active provider
    pub fn models(&self) -> Vec<String> {
        self.adapter.models()
    }

    async fn complete_with_retry(&self, request: &GenerationRequest) -> GenerationResult {
        let mut attempt = 0;
        loop {
            match self.adapter.complete(request).await {
                Ok(text) => {
                    debug!(
                        provider = self.adapter.name(),
                        attempt,
                        bytes = text.len(),
                        "generation ok"
                    );
                    return Ok(text);
                }
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        provider = self.adapter.name(),
                        attempt,
                        kind = %err.kind(),
                        delay_ms = delay.as_millis() as u64,
                        "transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    let err = if err.is_retryable() { err.persist() } else { err };
                    return Err(err
                        .with_operation("gateway::chat")
                        .with_context("provider", self.adapter.name())
                        .with_context("attempts", (attempt + 1).to_string()));
                }
            }
        }
    }
}

impl ChatModel for ModelGateway {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> GenerationResult {
        let messages = normalize_messages(messages)?;
        let request = GenerationRequest::new(messages, clamp_temperature(temperature))
            .with_max_tokens(self.max_tokens);
        self.complete_with_retry(&request).await
    }

    fn default_temperature(&self) -> f32 {
        self.default_temperature
    }
}

/// Reshape a conversation into "system once first, then alternating turns".
///
/// System messages anywhere are folded into one leading message, adjacent
/// turns of the same role are merged, and a conversation that would open
/// with the assistant gets a filler user turn in front.
pub fn normalize_messages(messages: &[ChatMessage]) -> Result<Vec<ChatMessage>> {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let mut turns: Vec<ChatMessage> = Vec::with_capacity(messages.len());
    for msg in messages.iter().filter(|m| m.role != Role::System) {
        match turns.last_mut() {
            Some(last) if last.role == msg.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&msg.content);
            }
            _ => turns.push(msg.clone()),
        }
    }

    if turns.is_empty() {
        return Err(Error::unknown("conversation has no user or assistant turns")
            .with_operation("gateway::normalize")
            .with_context("messages", messages.len().to_string()));
    }

    if turns[0].role == Role::Assistant {
        turns.insert(0, ChatMessage::user(CONTINUE_PROMPT));
    }

    let mut out = Vec::with_capacity(turns.len() + 1);
    if !system.is_empty() {
        out.push(ChatMessage::system(system.join("\n\n")));
    }
    out.extend(turns);
    Ok(out)
}

fn clamp_temperature(temperature: f32) -> f32 {
    let (lo, hi) = TEMPERATURE_RANGE;
    if temperature.is_nan() {
        warn!("temperature is NaN, using {}", lo);
        return lo;
    }
    if temperature < lo || temperature > hi {
        let clamped = temperature.clamp(lo, hi);
        warn!(requested = temperature, clamped, "temperature out of range");
        return clamped;
    }
    temperature
}
