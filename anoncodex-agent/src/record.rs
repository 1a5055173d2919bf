//! What a run leaves behind: step records, status and the final report.

use crate::action::Action;
use anoncodex_error::{Error, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of applying one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Ok { output: String },
    Err { kind: String, detail: String },
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok { .. })
    }

    /// Output on success, error detail otherwise
    pub fn text(&self) -> &str {
        match self {
            Outcome::Ok { output } => output,
            Outcome::Err { detail, .. } => detail,
        }
    }
}

impl From<Result<String, Error>> for Outcome {
    fn from(result: Result<String, Error>) -> Self {
        match result {
            Ok(output) => Outcome::Ok { output },
            Err(err) => Outcome::Err {
                kind: err.kind().as_str().to_string(),
                detail: err.message().to_string(),
            },
        }
    }
}

/// One applied action, in the order it was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub action: Action,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(action: Action, outcome: impl Into<Outcome>) -> Self {
        Self {
            action,
            outcome: outcome.into(),
            timestamp: Utc::now(),
        }
    }

    /// Prompt-friendly rendering
    pub fn summary(&self) -> String {
        match &self.outcome {
            Outcome::Ok { output } if output.trim().is_empty() => {
                format!("{}: ok", self.action)
            }
            Outcome::Ok { output } => format!("{}: ok\n{}", self.action, output.trim_end()),
            Outcome::Err { kind, detail } => {
                format!("{}: FAILED ({})\n{}", self.action, kind, detail.trim_end())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Planning,
    Executing,
    Verifying,
    Done,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Planning => "planning",
            RunStatus::Executing => "executing",
            RunStatus::Verifying => "verifying",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The gateway returned an error for a planning or verifying call
    ModelUnavailable { kind: ErrorKind, message: String },
    StepBudgetExceeded { limit: usize },
    /// The model kept answering without any action
    Unproductive,
    Cancelled,
}

impl From<&Error> for FailureReason {
    fn from(err: &Error) -> Self {
        FailureReason::ModelUnavailable {
            kind: err.kind(),
            message: err.user_message(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ModelUnavailable { message, .. } => {
                write!(f, "model unavailable: {}", message)
            }
            FailureReason::StepBudgetExceeded { limit } => {
                write!(f, "step budget of {} exceeded", limit)
            }
            FailureReason::Unproductive => f.write_str("model produced no actions"),
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// The single live state of one autonomous run
#[derive(Debug, Clone)]
pub struct RunState {
    pub goal: String,
    pub history: Vec<StepRecord>,
    pub status: RunStatus,
    pub failure: Option<FailureReason>,
    /// Planning -> Executing -> Verifying cycles started so far
    pub steps: usize,
}

impl RunState {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            history: Vec::new(),
            status: RunStatus::Planning,
            failure: None,
            steps: 0,
        }
    }
}

/// Terminal snapshot of a run, handed back to the caller and persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub goal: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Set for `Done` runs from the model's finish summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn from_state(state: RunState, started_at: DateTime<Utc>) -> Self {
        let summary = state.history.iter().rev().find_map(|r| match &r.action {
            Action::Finish { summary } if state.status == RunStatus::Done => Some(summary.clone()),
            _ => None,
        });
        Self {
            goal: state.goal,
            status: state.status,
            failure: state.failure.map(|f| f.to_string()),
            summary,
            steps: state.history,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_result() {
        let ok: Outcome = Ok::<_, Error>("fine".to_string()).into();
        assert!(ok.is_ok());
        assert_eq!(ok.text(), "fine");

        let err: Outcome = Err::<String, _>(Error::denied("run `ls`")).into();
        assert_eq!(
            err,
            Outcome::Err {
                kind: "Denied".into(),
                detail: "not permitted: run `ls`".into()
            }
        );
    }

    #[test]
    fn test_step_summary() {
        let record = StepRecord::new(
            Action::run("make"),
            Outcome::Err {
                kind: "CommandFailed".into(),
                detail: "exit code 2".into(),
            },
        );
        assert_eq!(record.summary(), "run `make`: FAILED (CommandFailed)\nexit code 2");
    }

    #[test]
    fn test_report_roundtrips_through_json() {
        let mut state = RunState::new("make a file");
        state.history.push(StepRecord::new(
            Action::write_file("a.txt", "x"),
            Outcome::Ok {
                output: "created a.txt".into(),
            },
        ));
        state.history.push(StepRecord::new(
            Action::finish("wrote it"),
            Outcome::Ok {
                output: "wrote it".into(),
            },
        ));
        state.status = RunStatus::Done;

        let report = RunReport::from_state(state, Utc::now());
        assert_eq!(report.summary.as_deref(), Some("wrote it"));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""type":"write_file""#));
        assert!(json.contains(r#""status":"done""#));
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_failure_display() {
        let reason = FailureReason::StepBudgetExceeded { limit: 3 };
        assert_eq!(reason.to_string(), "step budget of 3 exceeded");
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Verifying.is_terminal());
    }
}
