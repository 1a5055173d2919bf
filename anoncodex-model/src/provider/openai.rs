//! OpenAI provider implementation
//!
//! The chat-completions wire types are shared with LM Studio, which speaks
//! the same dialect on a local port.

use super::http::{build_client, require_text, send_json};
use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// OpenAI chat-completions provider
pub struct OpenAIAdapter {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config, "openai::new")?;
        Ok(Self { client, config })
    }
}

impl ProviderAdapter for OpenAIAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn models(&self) -> Vec<String> {
        ProviderKind::OpenAI
            .known_models()
            .iter()
            .map(|m| m.to_string())
            .collect()
    }

    fn default_model(&self) -> &str {
        self.config.model()
    }

    async fn complete(&self, request: &GenerationRequest) -> GenerationResult {
        let body = ChatCompletionRequest::from_request(Some(self.default_model()), request);

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url()))
            .json(&body);

        if let Some(api_key) = &self.config.api_key {
            req = req.bearer_auth(api_key);
        }

        let response: ChatCompletionResponse = send_json(req, "openai::complete").await?;
        response.into_text("openai::complete")
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

impl ChatCompletionRequest {
    pub(crate) fn from_request(model: Option<&str>, request: &GenerationRequest) -> Self {
        Self {
            model: model.map(str::to_string),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().into(),
            content: Some(msg.content.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    /// Text of the top choice
    pub(crate) fn into_text(self, operation: &'static str) -> GenerationResult {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            Error::bad_response("no choices in response").with_operation(operation)
        })?;
        require_text(choice.message.content, operation)
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}
