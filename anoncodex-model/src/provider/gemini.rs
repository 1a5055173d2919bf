//! Google Gemini provider implementation
//!
//! Uses the `generateContent` REST endpoint with the key as a query
//! parameter. Gemini has no "assistant" role; replies are tagged "model".

use super::http::{build_client, require_text, send_json};
use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Nucleus sampling cutoff sent with every request
const TOP_P: f32 = 0.95;

/// Gemini provider
pub struct GeminiAdapter {
    client: Client,
    config: ProviderConfig,
}

impl GeminiAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config, "gemini::new")?;
        Ok(Self { client, config })
    }

    fn build_request(&self, request: &GenerationRequest) -> GenerateContentRequest {
        let contents = request
            .turns()
            .iter()
            .map(|msg| Content {
                role: Some(
                    match msg.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: Some(msg.content.clone()),
                }],
            })
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction: request.system_prompt().map(|text| Content {
                role: None,
                parts: vec![Part {
                    text: Some(text.to_string()),
                }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                top_p: TOP_P,
            },
        }
    }
}

impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn models(&self) -> Vec<String> {
        ProviderKind::Gemini
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
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url(),
            self.default_model()
        );

        let mut req = self.client.post(url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            req = req.query(&[("key", api_key)]);
        }

        let response: GenerateContentResponse = send_json(req, "gemini::complete").await?;
        response.into_text()
    }
}

// ============================================================================
// Gemini API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn into_text(self) -> GenerationResult {
        let content = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| {
                Error::bad_response("no candidates in response").with_operation("gemini::complete")
            })?;

        let texts: Vec<String> = content.parts.into_iter().filter_map(|p| p.text).collect();
        let text = if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        };
        require_text(text, "gemini::complete")
    }
}
