//! System and turn prompts for the three operating modes.

use crate::action::MarkerGrammar;
use crate::record::StepRecord;
use anoncodex_error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const BASE_PROMPT: &str = "\
You are a precise coding assistant working inside a command-line terminal on the \
user's machine. You pair-program like a senior developer: solve the task step by \
step and keep replies short.

You can read and write files in the current workspace, search its code and run \
shell commands on {os}. Read the relevant code before changing it and never guess \
at file contents.

When replying:
- Be precise, clear and minimal
- Focus only on the code that matters for the task
- Write complete file contents when you change a file
- Fix any errors your own changes introduce";

const INTERACTIVE_MODE: &str = "\
Interactive mode:
- Answer the user's questions directly
- Ask a clarifying question when the request is ambiguous
- Use actions only when the question needs the workspace";

const AUTONOMOUS_MODE: &str = "\
Autonomous mode:
- You plan and carry out the whole task without further input
- Break the task into steps and emit the actions for the next step
- After each step you are shown what happened; fix failures before moving on
- When the goal is met, reply with a finish block and nothing else";

const MANUAL_MODE: &str = "\
Manual mode:
- The user confirms every action, including reads, before it runs
- Propose one small step at a time and explain why it is needed";

/// Operating mode of the assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Interactive,
    Autonomous,
    Manual,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Interactive => "interactive",
            Mode::Autonomous => "autonomous",
            Mode::Manual => "manual",
        }
    }

    fn instructions(&self) -> &'static str {
        match self {
            Mode::Interactive => INTERACTIVE_MODE,
            Mode::Autonomous => AUTONOMOUS_MODE,
            Mode::Manual => MANUAL_MODE,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interactive" | "i" => Ok(Mode::Interactive),
            "autonomous" | "auto" | "a" => Ok(Mode::Autonomous),
            "manual" | "m" => Ok(Mode::Manual),
            other => Err(Error::config_invalid(format!(
                "unknown mode '{}', expected interactive, autonomous or manual",
                other
            ))),
        }
    }
}

/// Renders every prompt the controllers send
#[derive(Debug, Clone)]
pub struct PromptBook {
    grammar: MarkerGrammar,
    os: String,
    context: Vec<(String, String)>,
}

impl PromptBook {
    pub fn new(grammar: MarkerGrammar) -> Self {
        Self {
            grammar,
            os: std::env::consts::OS.to_string(),
            context: Vec::new(),
        }
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    /// Extra key/value facts appended to every system prompt
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    pub fn grammar(&self) -> &MarkerGrammar {
        &self.grammar
    }

    pub fn system_prompt(&self, mode: Mode) -> String {
        let mut prompt = BASE_PROMPT.replace("{os}", &self.os);
        prompt.push_str("\n\n");
        prompt.push_str(mode.instructions());
        prompt.push_str("\n\n");
        prompt.push_str(&self.grammar.instructions());

        if !self.context.is_empty() {
            prompt.push_str("\n\nContext:");
            for (key, value) in &self.context {
                prompt.push_str(&format!("\n- {}: {}", key, value));
            }
        }
        prompt
    }

    /// Goal plus everything done so far
    pub fn planning(&self, goal: &str, history: &[StepRecord]) -> String {
        let mut prompt = format!("Goal:\n{}\n", goal.trim());
        if history.is_empty() {
            prompt.push_str(
                "\nNothing has been done yet. Reply with the actions for the first step.",
            );
        } else {
            prompt.push_str("\nSteps so far:\n");
            prompt.push_str(&render_steps(history, 1));
            prompt.push_str(&format!(
                "\nReply with the actions for the next step, or a `{}` block if the goal is met.",
                self.grammar.finish
            ));
        }
        prompt
    }

    /// Everything done so far, with the batch starting at `latest_from`
    /// called out, and the question whether the goal is met
    pub fn verification(&self, goal: &str, history: &[StepRecord], latest_from: usize) -> String {
        let latest_from = latest_from.min(history.len());
        let (earlier, latest) = history.split_at(latest_from);

        let mut prompt = format!("Goal:\n{}\n", goal.trim());
        if !earlier.is_empty() {
            prompt.push_str("\nEarlier steps:\n");
            prompt.push_str(&render_steps(earlier, 1));
        }
        prompt.push_str("\nResults of the last step:\n");
        prompt.push_str(&render_steps(latest, latest_from + 1));
        prompt.push_str(&format!(
            "\nIs the goal satisfied? If it is, reply with a `{}` block. Otherwise reply with \
             the next actions; fix any failure above first.",
            self.grammar.finish
        ));
        prompt
    }

    /// Outcomes fed back into a conversation after its actions ran
    pub fn results(&self, records: &[StepRecord]) -> String {
        format!("Results of your actions:\n{}", render_steps(records, 1))
    }

    /// Sent once after a reply that contained no actions
    pub fn reformat(&self) -> String {
        format!(
            "Your last reply contained no actions, so nothing was done. Reply again using only \
             the fenced action blocks described below, with no other text.\n\n{}",
            self.grammar.instructions()
        )
    }
}

impl Default for PromptBook {
    fn default() -> Self {
        Self::new(MarkerGrammar::default())
    }
}

fn render_steps(records: &[StepRecord], first: usize) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}\n", first + i, r.summary()))
        .collect()
}
