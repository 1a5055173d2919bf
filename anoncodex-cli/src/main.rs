//! # anoncodex
//!
//! Terminal coding assistant.
//!
//! Usage:
//!   anoncodex                          interactive REPL
//!   anoncodex -q "what does main do?"  one question
//!   anoncodex -m autonomous -q "make the tests pass"
//!   anoncodex -m manual                confirm every action
//!
//! Credentials come from the environment or a `.env` file
//! (`GEMINI_API_KEY`, `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`).

mod cli;
mod config;
mod console;
mod session;

use anyhow::anyhow;
use clap::Parser;
use cli::Cli;
use session::{Interrupt, Session};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logs go to stderr; stdout belongs to the presenter
fn init_tracing(debug: bool) {
    let default = if debug { "anoncodex=debug" } else { "anoncodex=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let gateway = anoncodex_model::ModelGateway::initialize(cli.provider_config())
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    let session = Session::new(&cli, &gateway, Interrupt::install())?;
    match cli.query.as_deref() {
        Some(query) => {
            if !session.once(query).await? {
                std::process::exit(1);
            }
        }
        None => session.repl().await?,
    }
    Ok(())
}
