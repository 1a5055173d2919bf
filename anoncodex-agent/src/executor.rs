//! Executor: applies one action against the collaborators.

use crate::action::Action;
use crate::fs::FileOperations;
use crate::permissions::Permissions;
use crate::terminal::Terminal;
use anoncodex_error::{Error, ErrorKind, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound on command output and file contents handed to the model
pub const OUTPUT_LIMIT: usize = 64 * 1024;

/// Default number of search hits reported
pub const SEARCH_LIMIT: usize = 50;

/// Default wall-clock limit for one command
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Executor<F, T, P> {
    files: F,
    terminal: T,
    permissions: P,
    command_timeout: Duration,
    output_limit: usize,
    search_limit: usize,
    confirm_all: bool,
}

impl<F, T, P> Executor<F, T, P>
where
    F: FileOperations,
    T: Terminal,
    P: Permissions,
{
    pub fn new(files: F, terminal: T, permissions: P) -> Self {
        Self {
            files,
            terminal,
            permissions,
            command_timeout: COMMAND_TIMEOUT,
            output_limit: OUTPUT_LIMIT,
            search_limit: SEARCH_LIMIT,
            confirm_all: false,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = limit;
        self
    }

    /// Ask permission for reads and searches too, not only for mutations
    pub fn confirm_every_action(mut self) -> Self {
        self.confirm_all = true;
        self
    }

    pub fn files(&self) -> &F {
        &self.files
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    /// Apply `action`, returning its output or a structured failure.
    ///
    /// `Finish` is a no-op that echoes its summary; `Unparsed` is refused.
    pub async fn apply(&self, action: &Action) -> Result<String> {
        if action.is_unparsed() {
            return Err(Error::invalid_action("reply contained no action")
                .with_operation("executor::apply"));
        }
        if let Action::Finish { summary } = action {
            return Ok(summary.clone());
        }

        let gated = self.confirm_all || action.is_mutating();
        if gated && !self.permissions.confirm(action).is_allowed() {
            warn!(action = %action, "action denied");
            return Err(Error::denied(action.describe()).with_operation("executor::apply"));
        }

        debug!(action = %action, "applying");
        match action {
            Action::ReadFile { path } => {
                let content = self.files.read(path)?;
                Ok(bound(content, self.output_limit))
            }
            Action::WriteFile { path, content } => {
                let created = self.files.write(path, content)?;
                let verb = if created { "created" } else { "modified" };
                info!(path = %path, verb, "file written");
                Ok(format!("{} {} ({} bytes)", verb, path, content.len()))
            }
            Action::RunCommand { command } => {
                let output = self.terminal.run(command, self.command_timeout).await?;
                let combined = bound(output.combined(), self.output_limit);
                if output.success() {
                    return Ok(combined);
                }
                let code = output
                    .exit_code
                    .map_or_else(|| "signal".to_string(), |c| c.to_string());
                Err(Error::new(
                    ErrorKind::CommandFailed,
                    format!("exit code {}\n{}", code, combined),
                )
                .with_operation("executor::apply")
                .with_context("exit_code", code))
            }
            Action::SearchCode { query } => {
                let hits = self.files.search(query, self.search_limit)?;
                if hits.is_empty() {
                    return Ok(format!("no matches for '{}'", query));
                }
                let lines: Vec<String> = hits.iter().map(|h| h.to_string()).collect();
                Ok(lines.join("\n"))
            }
            Action::Finish { .. } | Action::Unparsed { .. } => Ok(String::new()),
        }
    }
}

/// Cut `text` to at most `limit` bytes plus a truncation notice
pub fn bound(text: String, limit: usize) -> String {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let dropped = text.len() - end;
    format!("{}\n[output truncated, {} more bytes]", &text[..end], dropped)
}
