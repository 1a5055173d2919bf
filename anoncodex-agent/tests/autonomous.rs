//! End-to-end autonomous runs against a real temp workspace and shell.
#![cfg(unix)]

use anoncodex_agent::{
    Action, AllowAll, AutonomousController, Executor, GuardedPermissions, LocalFiles, Outcome,
    PromptBook, RunHistory, RunStatus, ShellTerminal,
};
use anoncodex_model::{ChatMessage, ChatModel, GenerationResult};
use std::collections::VecDeque;
use std::sync::Mutex;
use tempfile::TempDir;

/// Replays fixed replies and remembers the prompts it was sent
struct Replay {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl Replay {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl ChatModel for Replay {
    async fn chat(&self, messages: &[ChatMessage], _temperature: f32) -> GenerationResult {
        if let Some(last) = messages.last() {
            self.prompts.lock().unwrap().push(last.content.clone());
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anoncodex_error::Error::unknown("out of replies"))
    }
}

fn executor(dir: &TempDir) -> Executor<LocalFiles, ShellTerminal, GuardedPermissions<AllowAll>> {
    Executor::new(
        LocalFiles::new(dir.path()).unwrap(),
        ShellTerminal::new(dir.path()),
        GuardedPermissions::new(AllowAll).unwrap(),
    )
}

#[tokio::test]
async fn test_write_run_verify_finish() {
    let dir = TempDir::new().unwrap();
    let model = Replay::new(&[
        "```write_file notes/a.txt\nhello from the agent\n```\n```run cat notes/a.txt\n```",
        "```finish wrote and checked notes/a.txt\n```",
    ]);

    let report = AutonomousController::new(&model, executor(&dir), PromptBook::default())
        .run("create notes/a.txt and show it")
        .await;

    assert_eq!(report.status, RunStatus::Done);
    assert_eq!(report.steps.len(), 3);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("notes/a.txt")).unwrap(),
        "hello from the agent"
    );
    assert_eq!(report.steps[1].outcome.text().trim(), "hello from the agent");

    let prompts = model.prompts();
    assert!(prompts[1].contains("created notes/a.txt"));
    assert!(prompts[1].contains("hello from the agent"));
}

#[tokio::test]
async fn test_failures_are_fed_back_not_fatal() {
    let dir = TempDir::new().unwrap();
    let model = Replay::new(&[
        "```write_file ../outside.txt\nx\n```\n```run sudo rm -rf /tmp/x\n```\n```run exit 3\n```",
        "```finish nothing could be done\n```",
    ]);

    let report = AutonomousController::new(&model, executor(&dir), PromptBook::default())
        .run("try some things")
        .await;

    assert_eq!(report.status, RunStatus::Done);
    let kinds: Vec<String> = report
        .steps
        .iter()
        .filter_map(|s| match &s.outcome {
            Outcome::Err { kind, .. } => Some(kind.clone()),
            Outcome::Ok { .. } => None,
        })
        .collect();
    assert_eq!(kinds, vec!["Denied", "Denied", "CommandFailed"]);
    assert!(!dir.path().parent().unwrap().join("outside.txt").exists());

    let verification = &model.prompts()[1];
    assert!(verification.contains("FAILED (Denied)"));
    assert!(verification.contains("exit code 3"));
}

#[tokio::test]
async fn test_search_and_history() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("lib.rs"), "pub fn answer() -> u32 {\n    42\n}\n").unwrap();
    let model = Replay::new(&[
        "```search fn answer\n```",
        "```finish found it in lib.rs\n```",
    ]);

    let report = AutonomousController::new(&model, executor(&dir), PromptBook::default())
        .run("where is answer defined?")
        .await;

    assert_eq!(report.steps[0].action, Action::search("fn answer"));
    assert_eq!(report.steps[0].outcome.text(), "lib.rs:1: pub fn answer() -> u32 {");

    let history = RunHistory::new(dir.path().join(".history")).unwrap();
    history.save(&report).unwrap();
    let listed = history.list().unwrap();
    assert_eq!(listed, vec![report]);
}
