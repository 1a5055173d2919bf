//! Anthropic Claude provider implementation
//!
//! Talks to the Messages API. The system prompt travels in its own field
//! rather than as a message.

use super::http::{build_client, require_text, send_json};
use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct ClaudeAdapter {
    client: Client,
    config: ProviderConfig,
}

impl ClaudeAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config, "claude::new")?;
        Ok(Self { client, config })
    }

    fn build_request(&self, request: &GenerationRequest) -> MessagesRequest {
        MessagesRequest {
            model: self.default_model().to_string(),
            system: request.system_prompt().map(str::to_string),
            messages: request
                .turns()
                .iter()
                .map(|msg| WireMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                })
                .collect(),
            // the Messages API refuses requests without max_tokens
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: request.temperature,
        }
    }
}

impl ProviderAdapter for ClaudeAdapter {
    fn name(&self) -> &str {
        "claude"
    }

    fn models(&self) -> Vec<String> {
        ProviderKind::Claude
            .known_models()
            .iter()
            .map(|m| m.to_string())
            .collect()
    }

    fn default_model(&self) -> &str {
        self.config.model()
    }

    async fn complete(&self, request: &GenerationRequest) -> GenerationResult {
        let body = self.build_request(request);

        let mut req = self
            .client
            .post(format!("{}/messages", self.config.base_url()))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        if let Some(api_key) = &self.config.api_key {
            req = req.header("x-api-key", api_key);
        }

        let response: MessagesResponse = send_json(req, "claude::complete").await?;
        response.into_text()
    }
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Option<Vec<ContentBlock>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    /// Concatenated text blocks; other block types are skipped
    fn into_text(self) -> GenerationResult {
        let blocks = self.content.ok_or_else(|| {
            Error::bad_response("response has no content").with_operation("claude::complete")
        })?;

        let texts: Vec<String> = blocks
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        let text = if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        };
        require_text(text, "claude::complete")
    }
}
