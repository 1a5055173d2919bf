//! Ollama provider - local LLM server
//!
//! Default endpoint: http://localhost:11434/api/chat

use super::http::{build_client, probe, require_text, send_json};
use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Ollama provider
pub struct OllamaAdapter {
    client: Client,
    config: ProviderConfig,
}

impl OllamaAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config, "ollama::new")?;
        Ok(Self { client, config })
    }

    fn build_request(&self, request: &GenerationRequest) -> ChatRequest {
        ChatRequest {
            model: self.default_model().to_string(),
            messages: request
                .messages
                .iter()
                .map(|msg| WireMessage {
                    role: msg.role.as_str().to_string(),
                    content: Some(msg.content.clone()),
                })
                .collect(),
            stream: false,
            options: Options {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }
}

impl ProviderAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    fn models(&self) -> Vec<String> {
        ProviderKind::Ollama
            .known_models()
            .iter()
            .map(|m| m.to_string())
            .collect()
    }

    fn default_model(&self) -> &str {
        self.config.model()
    }

    async fn probe(&self) -> Result<()> {
        probe(
            &self.client,
            &format!("{}/api/version", self.config.base_url()),
            self.config.probe_timeout,
            "ollama::probe",
        )
        .await
    }

    async fn complete(&self, request: &GenerationRequest) -> GenerationResult {
        let body = self.build_request(request);

        let req = self
            .client
            .post(format!("{}/api/chat", self.config.base_url()))
            .json(&body);

        let response: ChatResponse = send_json(req, "ollama::complete").await?;
        let message = response.message.ok_or_else(|| {
            Error::bad_response("response has no message").with_operation("ollama::complete")
        })?;
        require_text(message.content, "ollama::complete")
    }
}

// ============================================================================
// Ollama API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<WireMessage>,
}
