//! Conversational controllers: one model turn per user query.

use crate::action::ActionInterpreter;
use crate::executor::Executor;
use crate::fs::FileOperations;
use crate::permissions::Permissions;
use crate::presenter::{NullPresenter, Presenter};
use crate::prompt::{Mode, PromptBook};
use crate::record::StepRecord;
use crate::terminal::Terminal;
use anoncodex_error::Result;
use anoncodex_model::{ChatMessage, ChatModel};
use tracing::{debug, info};

/// What one query produced
#[derive(Debug, Clone)]
pub struct Turn {
    pub reply: String,
    /// Actions from the reply that were applied, in order
    pub steps: Vec<StepRecord>,
}

/// Keeps a conversation with the model and applies the actions its replies
/// carry. Mutating actions go through the permissions collaborator.
pub struct InteractiveController<M, F, T, P, R = NullPresenter> {
    model: M,
    executor: Executor<F, T, P>,
    interpreter: ActionInterpreter,
    prompts: PromptBook,
    history: Vec<ChatMessage>,
    presenter: R,
    temperature: Option<f32>,
}

impl<M, F, T, P> InteractiveController<M, F, T, P, NullPresenter>
where
    M: ChatModel,
    F: FileOperations,
    T: Terminal,
    P: Permissions,
{
    pub fn new(model: M, executor: Executor<F, T, P>, prompts: PromptBook) -> Self {
        Self::with_mode(model, executor, prompts, Mode::Interactive)
    }

    fn with_mode(model: M, executor: Executor<F, T, P>, prompts: PromptBook, mode: Mode) -> Self {
        let history = vec![ChatMessage::system(prompts.system_prompt(mode))];
        Self {
            model,
            executor,
            interpreter: ActionInterpreter::new(prompts.grammar().clone()),
            prompts,
            history,
            presenter: NullPresenter,
            temperature: None,
        }
    }
}

impl<M, F, T, P, R> InteractiveController<M, F, T, P, R>
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
    ) -> InteractiveController<M, F, T, P, R2> {
        InteractiveController {
            model: self.model,
            executor: self.executor,
            interpreter: self.interpreter,
            prompts: self.prompts,
            history: self.history,
            presenter,
            temperature: self.temperature,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Forget everything but the system prompt
    pub fn clear(&mut self) {
        self.history.truncate(1);
        info!("conversation cleared");
    }

    /// Send `query`, apply the reply's actions and feed their outcomes
    /// back into the conversation.
    ///
    /// A model error leaves the history as it was before the call.
    pub async fn ask(&mut self, query: &str) -> Result<Turn> {
        self.history.push(ChatMessage::user(query));

        let temperature = self
            .temperature
            .unwrap_or_else(|| self.model.default_temperature());
        let result = self.model.chat(&self.history, temperature).await;
        self.presenter.generation(&result);
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                self.history.pop();
                return Err(err);
            }
        };
        self.history.push(ChatMessage::assistant(reply.clone()));

        let mut steps = Vec::new();
        for action in self.interpreter.parse(&reply) {
            // finish has no meaning outside an autonomous run
            if action.is_unparsed() || action.is_finish() {
                continue;
            }
            let outcome = self.executor.apply(&action).await;
            let record = StepRecord::new(action, outcome);
            self.presenter.step(&record);
            steps.push(record);
        }

        if !steps.is_empty() {
            debug!(steps = steps.len(), "feeding action results back");
            self.history.push(ChatMessage::user(self.prompts.results(&steps)));
        }
        Ok(Turn { reply, steps })
    }
}

/// Interactive conversation where every action, reads included, is
/// confirmed first
pub struct ManualController<M, F, T, P, R = NullPresenter> {
    inner: InteractiveController<M, F, T, P, R>,
}

impl<M, F, T, P> ManualController<M, F, T, P, NullPresenter>
where
    M: ChatModel,
    F: FileOperations,
    T: Terminal,
    P: Permissions,
{
    pub fn new(model: M, executor: Executor<F, T, P>, prompts: PromptBook) -> Self {
        Self {
            inner: InteractiveController::with_mode(
                model,
                executor.confirm_every_action(),
                prompts,
                Mode::Manual,
            ),
        }
    }
}

impl<M, F, T, P, R> ManualController<M, F, T, P, R>
where
    M: ChatModel,
    F: FileOperations,
    T: Terminal,
    P: Permissions,
    R: Presenter,
{
    pub fn with_presenter<R2: Presenter>(self, presenter: R2) -> ManualController<M, F, T, P, R2> {
        ManualController {
            inner: self.inner.with_presenter(presenter),
        }
    }

    pub fn with_temperature(self, temperature: f32) -> Self {
        Self {
            inner: self.inner.with_temperature(temperature),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        self.inner.history()
    }

    pub fn clear(&mut self) {
        self.inner.clear()
    }

    pub async fn ask(&mut self, query: &str) -> Result<Turn> {
        self.inner.ask(query).await
    }
}
