//! # anoncodex-agent
//!
//! Turns model replies into work on the local machine:
//! 1. [`ActionInterpreter`] finds the fenced action blocks in a reply
//! 2. [`Executor`] applies each action through the file, terminal and
//!    permissions collaborators
//! 3. [`AutonomousController`] loops plan -> execute -> verify until the
//!    model finishes or the run fails
//!
//! [`InteractiveController`] and [`ManualController`] drive the same
//! pieces one query at a time.

pub mod action;
pub mod controller;
pub mod conversation;
pub mod executor;
pub mod fs;
pub mod history;
pub mod permissions;
pub mod presenter;
pub mod prompt;
pub mod record;
pub mod terminal;

#[cfg(test)]
mod testing;

pub use action::{Action, ActionInterpreter, MarkerGrammar};
pub use controller::{AutonomousController, MAX_STEPS};
pub use conversation::{InteractiveController, ManualController, Turn};
pub use executor::{Executor, COMMAND_TIMEOUT, OUTPUT_LIMIT, SEARCH_LIMIT};
pub use fs::{FileOperations, LocalFiles, SearchHit};
pub use history::RunHistory;
pub use permissions::{AllowAll, Decision, DenyAll, GuardedPermissions, Permissions};
pub use presenter::{NullPresenter, Presenter};
pub use prompt::{Mode, PromptBook};
pub use record::{FailureReason, Outcome, RunReport, RunState, RunStatus, StepRecord};
pub use terminal::{CommandOutput, ShellTerminal, Terminal};
