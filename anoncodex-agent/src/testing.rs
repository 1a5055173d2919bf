//! In-memory collaborators for unit tests.
//!
//! Every fake is a cheap clone over shared state, so a test keeps one handle
//! and gives another to the code under test.

use crate::action::Action;
use crate::fs::{FileOperations, SearchHit};
use crate::permissions::{Decision, Permissions};
use crate::presenter::Presenter;
use crate::record::{RunStatus, StepRecord};
use crate::terminal::{CommandOutput, Terminal};
use anoncodex_error::{Error, ErrorKind, Result};
use anoncodex_model::{ChatMessage, ChatModel, GenerationResult};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Files
// ============================================================================

#[derive(Default)]
struct FileState {
    files: BTreeMap<String, String>,
    writes: Vec<(String, String)>,
}

#[derive(Clone, Default)]
pub struct MemoryFiles {
    state: Arc<Mutex<FileState>>,
}

impl MemoryFiles {
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), content.to_string());
        self
    }

    /// Every write in order, including overwrites
    pub fn writes(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.state.lock().unwrap().files.get(path).cloned()
    }
}

impl FileOperations for MemoryFiles {
    fn read(&self, path: &str) -> Result<String> {
        self.content(path).ok_or_else(|| {
            Error::new(ErrorKind::FileNotFound, format!("{}: no such file", path))
        })
    }

    fn write(&self, path: &str, content: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.writes.push((path.to_string(), content.to_string()));
        Ok(state
            .files
            .insert(path.to_string(), content.to_string())
            .is_none())
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let state = self.state.lock().unwrap();
        let hits = state
            .files
            .iter()
            .flat_map(|(path, content)| {
                content.lines().enumerate().filter_map(move |(i, line)| {
                    line.contains(query).then(|| SearchHit {
                        path: path.clone(),
                        line: i + 1,
                        text: line.trim().to_string(),
                    })
                })
            })
            .take(limit)
            .collect();
        Ok(hits)
    }
}

// ============================================================================
// Terminal
// ============================================================================

#[derive(Default)]
struct TerminalState {
    script: VecDeque<Result<CommandOutput>>,
    commands: Vec<String>,
}

/// Replays scripted outcomes; once the script is empty every command
/// succeeds with no output
#[derive(Clone, Default)]
pub struct ScriptedTerminal {
    state: Arc<Mutex<TerminalState>>,
}

impl ScriptedTerminal {
    pub fn then_output(self, output: CommandOutput) -> Self {
        self.state.lock().unwrap().script.push_back(Ok(output));
        self
    }

    pub fn then_timeout(self) -> Self {
        self.state
            .lock()
            .unwrap()
            .script
            .push_back(Err(Error::timeout("command", Duration::from_secs(1))));
        self
    }

    pub fn then_spawn_failure(self) -> Self {
        self.state
            .lock()
            .unwrap()
            .script
            .push_back(Err(Error::new(ErrorKind::SpawnFailed, "sh: not found")));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }
}

impl Terminal for ScriptedTerminal {
    async fn run(&self, command: &str, _timeout: Duration) -> Result<CommandOutput> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.to_string());
        state.script.pop_front().unwrap_or_else(|| {
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: Some(0),
            })
        })
    }
}

// ============================================================================
// Permissions
// ============================================================================

#[derive(Clone)]
pub struct RecordingPermissions {
    decision: Decision,
    asked: Arc<Mutex<Vec<Action>>>,
}

impl RecordingPermissions {
    pub fn allowing() -> Self {
        Self {
            decision: Decision::Allow,
            asked: Arc::default(),
        }
    }

    pub fn denying() -> Self {
        Self {
            decision: Decision::Deny,
            asked: Arc::default(),
        }
    }

    pub fn asked(&self) -> Vec<Action> {
        self.asked.lock().unwrap().clone()
    }
}

impl Permissions for RecordingPermissions {
    fn confirm(&self, action: &Action) -> Decision {
        self.asked.lock().unwrap().push(action.clone());
        self.decision
    }
}

// ============================================================================
// Model
// ============================================================================

#[derive(Default)]
struct ModelState {
    replies: VecDeque<std::result::Result<String, ErrorKind>>,
    repeating: Option<String>,
    calls: Vec<Vec<ChatMessage>>,
}

/// Answers from a queue, then with the `repeating` reply if one is set
#[derive(Clone, Default)]
pub struct ScriptedModel {
    state: Arc<Mutex<ModelState>>,
}

impl ScriptedModel {
    pub fn reply(self, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .replies
            .push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, kind: ErrorKind) -> Self {
        self.state.lock().unwrap().replies.push_back(Err(kind));
        self
    }

    pub fn repeating(self, text: &str) -> Self {
        self.state.lock().unwrap().repeating = Some(text.to_string());
        self
    }

    /// The messages of every call so far
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Content of the final message of call `index`
    pub fn last_user_prompt(&self, index: usize) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .calls
            .get(index)
            .and_then(|messages| messages.last())
            .map(|m| m.content.clone())
    }
}

impl ChatModel for ScriptedModel {
    async fn chat(&self, messages: &[ChatMessage], _temperature: f32) -> GenerationResult {
        let mut state = self.state.lock().unwrap();
        state.calls.push(messages.to_vec());
        match state.replies.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(kind)) => Err(Error::new(kind, "scripted failure")),
            None => state
                .repeating
                .clone()
                .ok_or_else(|| Error::unknown("model script exhausted")),
        }
    }
}

// ============================================================================
// Presenter
// ============================================================================

#[derive(Default)]
struct PresenterState {
    statuses: Vec<RunStatus>,
    steps: Vec<StepRecord>,
    unparsed: Vec<String>,
    generations: usize,
}

#[derive(Clone, Default)]
pub struct RecordingPresenter {
    state: Arc<Mutex<PresenterState>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingPresenter {
    /// Cancel `token` once `steps` records have been shown
    pub fn cancel_after_steps(mut self, steps: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((steps, token));
        self
    }

    pub fn statuses(&self) -> Vec<RunStatus> {
        self.state.lock().unwrap().statuses.clone()
    }

    pub fn steps(&self) -> Vec<StepRecord> {
        self.state.lock().unwrap().steps.clone()
    }

    pub fn unparsed(&self) -> Vec<String> {
        self.state.lock().unwrap().unparsed.clone()
    }

    pub fn generations(&self) -> usize {
        self.state.lock().unwrap().generations
    }
}

impl Presenter for RecordingPresenter {
    fn generation(&self, _result: &GenerationResult) {
        self.state.lock().unwrap().generations += 1;
    }

    fn unparsed(&self, raw: &str) {
        self.state.lock().unwrap().unparsed.push(raw.to_string());
    }

    fn step(&self, record: &StepRecord) {
        let shown = {
            let mut state = self.state.lock().unwrap();
            state.steps.push(record.clone());
            state.steps.len()
        };
        if let Some((after, token)) = &self.cancel_after {
            if shown >= *after {
                token.cancel();
            }
        }
    }

    fn status(&self, status: RunStatus) {
        self.state.lock().unwrap().statuses.push(status);
    }
}
