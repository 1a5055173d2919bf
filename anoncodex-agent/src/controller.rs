//! The autonomous plan -> execute -> verify loop.
//!
//! ```text
//! Planning -> Executing -> Verifying -> { Planning | Done | Failed }
//! ```
//!
//! One goal per run. Action failures never end a run; they are shown to the
//! model in the next prompt. Only a model error, the step budget, two
//! action-less replies in a row or cancellation do.

use crate::action::{Action, ActionInterpreter};
use crate::executor::Executor;
use crate::fs::FileOperations;
use crate::permissions::Permissions;
use crate::presenter::{NullPresenter, Presenter};
use crate::prompt::{Mode, PromptBook};
use crate::record::{FailureReason, RunReport, RunState, RunStatus, StepRecord};
use crate::terminal::Terminal;
use anoncodex_model::{ChatMessage, ChatModel};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default number of plan/execute/verify cycles per run
pub const MAX_STEPS: usize = 20;

/// What a model consultation produced
enum Consult {
    Actions(Vec<Action>),
    Failed(FailureReason),
}

/// How a batch of actions ended
enum Batch {
    Completed,
    Finished,
    Cancelled,
}

pub struct AutonomousController<M, F, T, P, R = NullPresenter> {
    model: M,
    executor: Executor<F, T, P>,
    interpreter: ActionInterpreter,
    prompts: PromptBook,
    presenter: R,
    max_steps: usize,
    temperature: Option<f32>,
    cancel: CancellationToken,
}

impl<M, F, T, P> AutonomousController<M, F, T, P, NullPresenter>
where
    M: ChatModel,
    F: FileOperations,
    T: Terminal,
    P: Permissions,
{
    pub fn new(model: M, executor: Executor<F, T, P>, prompts: PromptBook) -> Self {
        Self {
            model,
            executor,
            interpreter: ActionInterpreter::new(prompts.grammar().clone()),
            prompts,
            presenter: NullPresenter,
            max_steps: MAX_STEPS,
            temperature: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl<M, F, T, P, R> AutonomousController<M, F, T, P, R>
where
    M: ChatModel,
    F: FileOperations,
    T: Terminal,
    P: Permissions,
    R: Presenter,
{
    pub fn with_presenter<R2: Presenter>(
        self,
        presenter: R2,
    ) -> AutonomousController<M, F, T, P, R2> {
        AutonomousController {
            model: self.model,
            executor: self.executor,
            interpreter: self.interpreter,
            prompts: self.prompts,
            presenter,
            max_steps: self.max_steps,
            temperature: self.temperature,
            cancel: self.cancel,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Token checked between steps and between actions
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn executor(&self) -> &Executor<F, T, P> {
        &self.executor
    }

    /// Drive `goal` to a terminal state and report everything that happened
    pub async fn run(&self, goal: &str) -> RunReport {
        let started_at = Utc::now();
        let mut state = RunState::new(goal);
        let system = self.prompts.system_prompt(Mode::Autonomous);
        let mut pending: Option<Vec<Action>> = None;

        info!(max_steps = self.max_steps, "autonomous run started");

        loop {
            if self.cancel.is_cancelled() {
                self.fail(&mut state, FailureReason::Cancelled);
                break;
            }
            if state.steps >= self.max_steps {
                self.fail(&mut state, FailureReason::StepBudgetExceeded { limit: self.max_steps });
                break;
            }

            // Planning: a verification reply may already have supplied the batch
            self.enter(&mut state, RunStatus::Planning);
            let actions = match pending.take() {
                Some(actions) => actions,
                None => {
                    let prompt = self.prompts.planning(goal, &state.history);
                    match self.consult(&system, prompt).await {
                        Consult::Actions(actions) => actions,
                        Consult::Failed(reason) => {
                            self.fail(&mut state, reason);
                            break;
                        }
                    }
                }
            };
            state.steps += 1;

            self.enter(&mut state, RunStatus::Executing);
            let batch_start = state.history.len();
            match self.execute(&mut state, actions).await {
                Batch::Completed => {}
                Batch::Finished => {
                    self.enter(&mut state, RunStatus::Done);
                    break;
                }
                Batch::Cancelled => {
                    self.fail(&mut state, FailureReason::Cancelled);
                    break;
                }
            }

            self.enter(&mut state, RunStatus::Verifying);
            if self.cancel.is_cancelled() {
                self.fail(&mut state, FailureReason::Cancelled);
                break;
            }
            let prompt = self.prompts.verification(goal, &state.history, batch_start);
            match self.consult(&system, prompt).await {
                Consult::Actions(actions) if actions.first().is_some_and(Action::is_finish) => {
                    let finish = actions.into_iter().next();
                    if let Some(finish) = finish {
                        let outcome = self.executor.apply(&finish).await;
                        self.record(&mut state, StepRecord::new(finish, outcome));
                    }
                    self.enter(&mut state, RunStatus::Done);
                    break;
                }
                Consult::Actions(actions) => pending = Some(actions),
                Consult::Failed(reason) => {
                    self.fail(&mut state, reason);
                    break;
                }
            }
        }

        info!(status = %state.status, steps = state.history.len(), "autonomous run finished");
        RunReport::from_state(state, started_at)
    }

    /// Ask the model and parse the reply, re-prompting once with a stricter
    /// instruction when the reply holds no actions
    async fn consult(&self, system: &str, prompt: String) -> Consult {
        let mut messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
        let mut reformatted = false;

        loop {
            let temperature = self
                .temperature
                .unwrap_or_else(|| self.model.default_temperature());
            let result = self.model.chat(&messages, temperature).await;
            self.presenter.generation(&result);

            let text = match result {
                Ok(text) => text,
                Err(err) => {
                    warn!(kind = %err.kind(), "model call failed: {}", err);
                    return Consult::Failed(FailureReason::from(&err));
                }
            };

            let actions = self.interpreter.parse(&text);
            if !actions.iter().all(Action::is_unparsed) {
                return Consult::Actions(actions);
            }

            self.presenter.unparsed(&text);
            if reformatted {
                return Consult::Failed(FailureReason::Unproductive);
            }
            if self.cancel.is_cancelled() {
                return Consult::Failed(FailureReason::Cancelled);
            }
            info!("reply had no actions, asking once more");
            reformatted = true;
            messages.push(ChatMessage::assistant(text));
            messages.push(ChatMessage::user(self.prompts.reformat()));
        }
    }

    async fn execute(&self, state: &mut RunState, actions: Vec<Action>) -> Batch {
        for action in actions {
            if self.cancel.is_cancelled() {
                return Batch::Cancelled;
            }
            if action.is_unparsed() {
                continue;
            }
            let finished = action.is_finish();
            let outcome = self.executor.apply(&action).await;
            self.record(state, StepRecord::new(action, outcome));
            if finished {
                return Batch::Finished;
            }
        }
        Batch::Completed
    }

    fn record(&self, state: &mut RunState, record: StepRecord) {
        if record.outcome.is_ok() {
            info!(step = state.steps, action = %record.action, "step ok");
        } else {
            warn!(
                step = state.steps,
                action = %record.action,
                "step failed: {}",
                record.outcome.text()
            );
        }
        self.presenter.step(&record);
        state.history.push(record);
    }

    fn enter(&self, state: &mut RunState, status: RunStatus) {
        state.status = status;
        info!(step = state.steps, status = %status, "state transition");
        self.presenter.status(status);
    }

    fn fail(&self, state: &mut RunState, reason: FailureReason) {
        warn!(reason = %reason, "run failed");
        state.failure = Some(reason);
        self.enter(state, RunStatus::Failed);
    }
}
