//! Command line -> `ProviderConfig`.

use crate::cli::Cli;
use anoncodex_model::{ProviderConfig, ProviderKind};

impl Cli {
    /// The provider named by `--provider`, else inferred from the model name
    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.unwrap_or_else(|| {
            self.model
                .as_deref()
                .map(ProviderKind::from_model_name)
                .unwrap_or(ProviderKind::Gemini)
        })
    }

    pub fn provider_config(&self) -> ProviderConfig {
        let kind = self.provider_kind();
        let mut config = ProviderConfig::new(kind);

        let api_key = match kind {
            ProviderKind::Gemini => self.gemini_api_key.as_ref(),
            ProviderKind::OpenAI => self.openai_api_key.as_ref(),
            ProviderKind::Claude => self.anthropic_api_key.as_ref(),
            ProviderKind::Ollama | ProviderKind::LmStudio => None,
        };
        if let Some(key) = api_key {
            config = config.with_api_key(key.clone());
        }

        let local_url = match kind {
            ProviderKind::Ollama => self.ollama_base_url.as_ref(),
            ProviderKind::LmStudio => self.lm_studio_base_url.as_ref(),
            _ => None,
        };
        if let Some(url) = self.base_url.as_ref().or(local_url) {
            config = config.with_base_url(url.clone());
        }

        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            config = config.with_temperature(temperature);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["anoncodex"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_provider_inferred_from_model() {
        let cli = parse(&["--model", "claude-3-opus-20240229", "--anthropic-api-key", "sk-ant"]);
        let config = cli.provider_config();
        assert_eq!(config.kind, ProviderKind::Claude);
        assert_eq!(config.api_key.as_deref(), Some("sk-ant"));
        assert_eq!(config.model(), "claude-3-opus-20240229");
    }

    #[test]
    fn test_explicit_provider_wins() {
        let cli = parse(&[
            "--provider",
            "ollama",
            "--model",
            "gpt-oss",
            "--ollama-base-url",
            "http://box:11434",
        ]);
        let config = cli.provider_config();
        assert_eq!(config.kind, ProviderKind::Ollama);
        assert_eq!(config.base_url(), "http://box:11434");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_base_url_flag_overrides_local_env() {
        let cli = parse(&[
            "--provider",
            "lm-studio",
            "--lm-studio-base-url",
            "http://a:1234",
            "--base-url",
            "http://b:1234/",
        ]);
        assert_eq!(cli.provider_config().base_url(), "http://b:1234");
    }

    #[test]
    fn test_generation_knobs() {
        let cli = parse(&[
            "--provider",
            "openai",
            "--openai-api-key",
            "sk",
            "--max-tokens",
            "512",
            "--temperature",
            "0.9",
        ]);
        let config = cli.provider_config();
        assert_eq!(config.max_tokens, 512);
        assert!((config.default_temperature - 0.9).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mode_flag() {
        assert_eq!(parse(&["--mode", "auto"]).mode, anoncodex_agent::Mode::Autonomous);
        assert!(Cli::try_parse_from(["anoncodex", "--mode", "chatty"]).is_err());
    }
}
