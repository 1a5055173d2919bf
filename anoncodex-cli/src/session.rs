//! One process worth of work: one-shot queries, goals and the REPL.

use crate::cli::Cli;
use crate::console::{print_report, ConsolePermissions, ConsolePresenter};
use anoncodex_agent::{
    AutonomousController, Executor, GuardedPermissions, InteractiveController, LocalFiles,
    ManualController, Mode, PromptBook, RunHistory, RunReport, ShellTerminal, Turn,
};
use anoncodex_model::ModelGateway;
use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

type LocalPermissions = GuardedPermissions<ConsolePermissions>;
type LocalExecutor = Executor<LocalFiles, ShellTerminal, LocalPermissions>;
type InteractiveChat<'a> = InteractiveController<
    &'a ModelGateway,
    LocalFiles,
    ShellTerminal,
    LocalPermissions,
    ConsolePresenter,
>;
type ManualChat<'a> = ManualController<
    &'a ModelGateway,
    LocalFiles,
    ShellTerminal,
    LocalPermissions,
    ConsolePresenter,
>;

/// Routes Ctrl-C to the run in progress
#[derive(Clone, Default)]
pub struct Interrupt {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl Interrupt {
    /// Listen for Ctrl-C for the rest of the process. With no run armed the
    /// process exits as it would without a handler.
    pub fn install() -> Self {
        let interrupt = Self::default();
        let current = interrupt.current.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let armed = current.lock().ok().and_then(|guard| guard.clone());
                match armed {
                    Some(token) => {
                        eprintln!("\n{}", "^C - stopping after the current step".bright_yellow());
                        token.cancel();
                    }
                    None => std::process::exit(130),
                }
            }
        });
        interrupt
    }

    fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut guard) = self.current.lock() {
            *guard = Some(token.clone());
        }
        token
    }

    fn disarm(&self) {
        if let Ok(mut guard) = self.current.lock() {
            *guard = None;
        }
    }
}

enum Conversation<'a> {
    Interactive(InteractiveChat<'a>),
    Manual(ManualChat<'a>),
}

impl Conversation<'_> {
    async fn ask(&mut self, query: &str) -> anoncodex_error::Result<Turn> {
        match self {
            Conversation::Interactive(c) => c.ask(query).await,
            Conversation::Manual(c) => c.ask(query).await,
        }
    }

    fn clear(&mut self) {
        match self {
            Conversation::Interactive(c) => c.clear(),
            Conversation::Manual(c) => c.clear(),
        }
    }
}

pub struct Session<'a> {
    cli: &'a Cli,
    gateway: &'a ModelGateway,
    root: PathBuf,
    prompts: PromptBook,
    history: RunHistory,
    interrupt: Interrupt,
}

impl<'a> Session<'a> {
    pub fn new(cli: &'a Cli, gateway: &'a ModelGateway, interrupt: Interrupt) -> Result<Self> {
        let root = std::env::current_dir()?;
        let prompts = PromptBook::default()
            .with_context("workspace", root.display().to_string())
            .with_context("model", format!("{} ({})", gateway.model(), gateway.provider()));
        let history = RunHistory::new(&cli.history_dir)?;
        Ok(Self {
            cli,
            gateway,
            root,
            prompts,
            history,
            interrupt,
        })
    }

    fn executor(&self) -> Result<LocalExecutor> {
        let files = LocalFiles::new(&self.root)?;
        let permissions = GuardedPermissions::new(ConsolePermissions::new(self.cli.yes))?;
        Ok(Executor::new(files, ShellTerminal::new(&self.root), permissions)
            .with_command_timeout(Duration::from_secs(self.cli.command_timeout)))
    }

    fn conversation(&self) -> Result<Conversation<'a>> {
        let presenter = ConsolePresenter::new(self.cli.debug);
        let executor = self.executor()?;
        let prompts = self.prompts.clone();
        Ok(match self.cli.mode {
            Mode::Manual => Conversation::Manual(
                ManualController::new(self.gateway, executor, prompts).with_presenter(presenter),
            ),
            _ => Conversation::Interactive(
                InteractiveController::new(self.gateway, executor, prompts)
                    .with_presenter(presenter),
            ),
        })
    }

    /// Run one autonomous goal to completion, print and store its report
    pub async fn run_goal(&self, goal: &str) -> Result<RunReport> {
        let executor = self.executor()?;
        let controller = AutonomousController::new(self.gateway, executor, self.prompts.clone())
            .with_presenter(ConsolePresenter::new(self.cli.debug))
            .with_max_steps(self.cli.max_steps)
            .with_cancellation(self.interrupt.arm());

        let report = controller.run(goal).await;
        self.interrupt.disarm();

        print_report(&report);
        match self.history.save(&report) {
            Ok(path) => info!(path = %path.display(), "run report saved"),
            Err(e) => warn!("could not save run report: {}", e),
        }
        Ok(report)
    }

    /// `-q`: a single goal or question. Returns whether it succeeded.
    pub async fn once(&self, query: &str) -> Result<bool> {
        if self.cli.mode == Mode::Autonomous {
            return Ok(self.run_goal(query).await?.succeeded());
        }
        let mut conversation = self.conversation()?;
        Ok(self.answer(&mut conversation, query).await)
    }

    async fn answer(&self, conversation: &mut Conversation<'_>, query: &str) -> bool {
        match conversation.ask(query).await {
            Ok(turn) => {
                println!("\n{}", turn.reply.trim());
                true
            }
            Err(err) => {
                eprintln!("{} {}", "error:".red().bold(), err.user_message());
                false
            }
        }
    }

    pub async fn repl(&self) -> Result<()> {
        let mode = self.cli.mode;
        println!("{}", "anoncodex".bright_cyan().bold());
        println!(
            "{}",
            format!(
                "{} mode, {} via {}, workspace {}",
                mode,
                self.gateway.model(),
                self.gateway.provider(),
                self.root.display()
            )
            .bright_black()
        );
        println!("{}", "Type 'help' for commands, 'exit' to leave.\n".bright_black());

        let mut conversation = match mode {
            Mode::Autonomous => None,
            _ => Some(self.conversation()?),
        };
        let mut editor = DefaultEditor::new()?;
        let prompt = format!("{} ", format!("[{}]>", mode).bright_green().bold());

        loop {
            let line = match editor.readline(&prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            editor.add_history_entry(line).ok();

            match line {
                "exit" | "quit" => break,
                "help" => print_help(mode),
                "clear" => {
                    if let Some(conversation) = conversation.as_mut() {
                        conversation.clear();
                    }
                    println!("{}", "conversation cleared".bright_black());
                }
                "models" => {
                    for model in self.gateway.models() {
                        println!("  {}", model);
                    }
                }
                "history" => self.print_history(),
                _ => match conversation.as_mut() {
                    Some(conversation) => {
                        self.answer(conversation, line).await;
                    }
                    None => {
                        self.run_goal(line).await?;
                    }
                },
            }
        }
        Ok(())
    }

    fn print_history(&self) {
        match self.history.list() {
            Ok(reports) if reports.is_empty() => println!("{}", "no runs yet".bright_black()),
            Ok(reports) => {
                for report in reports {
                    let status = if report.succeeded() {
                        report.status.to_string().green()
                    } else {
                        report.status.to_string().red()
                    };
                    println!(
                        "  {}  {:<7} {:>3} steps  {}",
                        report.started_at.format("%Y-%m-%d %H:%M"),
                        status,
                        report.steps.len(),
                        report.goal
                    );
                }
            }
            Err(e) => eprintln!("{} {}", "error:".red().bold(), e.user_message()),
        }
    }
}

fn print_help(mode: Mode) {
    let input = match mode {
        Mode::Autonomous => "a goal to carry out autonomously",
        Mode::Manual => "a request; every action is confirmed first",
        Mode::Interactive => "a question or request",
    };
    println!("  <text>    {}", input);
    println!("  clear     forget the conversation");
    println!("  models    list known models for the provider");
    println!("  history   list stored autonomous runs");
    println!("  exit      leave (also quit, Ctrl-D)");
}
