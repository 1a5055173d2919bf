use anoncodex_agent::{Mode, MAX_STEPS};
use anoncodex_model::ProviderKind;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "anoncodex")]
#[command(
    author,
    version,
    about = "A terminal coding assistant over Gemini, OpenAI, Claude, Ollama or LM Studio"
)]
pub struct Cli {
    /// interactive, autonomous or manual
    #[arg(short, long, env = "DEFAULT_MODE", default_value = "interactive")]
    pub mode: Mode,

    /// Model name; the provider is inferred from it unless --provider is set
    #[arg(long, env = "DEFAULT_MODEL")]
    pub model: Option<String>,

    /// gemini, openai, claude, ollama or lm-studio
    #[arg(long)]
    pub provider: Option<ProviderKind>,

    /// Override the provider's endpoint
    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long, env = "MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    /// Plan/execute/verify cycles allowed per autonomous run
    #[arg(long, default_value_t = MAX_STEPS)]
    pub max_steps: usize,

    /// Seconds a shell command may run
    #[arg(long, default_value_t = 60, value_name = "SECS")]
    pub command_timeout: u64,

    /// Where autonomous run reports are stored
    #[arg(long, env = "HISTORY_PATH", default_value = "history")]
    pub history_dir: PathBuf,

    /// Approve every action without asking (dangerous commands are still refused)
    #[arg(short, long)]
    pub yes: bool,

    /// Debug logging and raw model replies
    #[arg(long)]
    pub debug: bool,

    /// Run a single query (or goal, in autonomous mode) and exit
    #[arg(short, long)]
    pub query: Option<String>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "OLLAMA_BASE_URL")]
    pub ollama_base_url: Option<String>,

    #[arg(long, env = "LM_STUDIO_BASE_URL")]
    pub lm_studio_base_url: Option<String>,
}
