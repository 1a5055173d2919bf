//! LM Studio provider - local server with an OpenAI-compatible API
//!
//! Default endpoint: http://localhost:1234/v1/chat/completions

use super::http::{build_client, probe, send_json};
use super::openai::{ChatCompletionRequest, ChatCompletionResponse};
use super::*;
use reqwest::Client;

/// LM Studio provider
pub struct LmStudioAdapter {
    client: Client,
    config: ProviderConfig,
}

impl LmStudioAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config, "lmstudio::new")?;
        Ok(Self { client, config })
    }
}

impl ProviderAdapter for LmStudioAdapter {
    fn name(&self) -> &str {
        "lm-studio"
    }

    fn models(&self) -> Vec<String> {
        ProviderKind::LmStudio
            .known_models()
            .iter()
            .map(|m| m.to_string())
            .collect()
    }

    fn default_model(&self) -> &str {
        self.config.model()
    }

    /// `GET /v1/models` answers as soon as the server is listening
    async fn probe(&self) -> Result<()> {
        probe(
            &self.client,
            &format!("{}/v1/models", self.config.base_url()),
            self.config.probe_timeout,
            "lmstudio::probe",
        )
        .await
    }

    async fn complete(&self, request: &GenerationRequest) -> GenerationResult {
        // LM Studio serves whichever model is loaded; "custom" means
        // "don't care" and is left out of the request.
        let model = match self.default_model() {
            "custom" => None,
            name => Some(name),
        };
        let body = ChatCompletionRequest::from_request(model, request);

        let req = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url()))
            .json(&body);

        let response: ChatCompletionResponse = send_json(req, "lmstudio::complete").await?;
        response.into_text("lmstudio::complete")
    }
}
