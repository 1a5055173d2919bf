//! Terminal presenter and the y/N permission prompt.

use anoncodex_agent::{
    Action, Decision, Outcome, Permissions, Presenter, RunReport, RunStatus, StepRecord,
};
use anoncodex_model::GenerationResult;
use colored::Colorize;
use std::io::{self, BufRead, Write};

/// Lines of action output echoed to the terminal
const PREVIEW_LINES: usize = 12;

pub struct ConsolePresenter {
    verbose: bool,
}

impl ConsolePresenter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Presenter for ConsolePresenter {
    fn generation(&self, result: &GenerationResult) {
        match result {
            Ok(text) if self.verbose => {
                println!("{}", "--- model reply ---".bright_black());
                println!("{}", text.bright_black());
            }
            Ok(_) => {}
            Err(err) => eprintln!("{} {}", "model error:".red().bold(), err.user_message()),
        }
    }

    fn unparsed(&self, raw: &str) {
        println!("{}", "reply contained no actions:".yellow());
        println!("{}", preview(raw));
    }

    fn step(&self, record: &StepRecord) {
        print_step(record);
    }

    fn status(&self, status: RunStatus) {
        let label = format!("[{}]", status);
        let label = match status {
            RunStatus::Done => label.green().bold(),
            RunStatus::Failed => label.red().bold(),
            _ => label.cyan(),
        };
        println!("{}", label);
    }
}

pub fn print_step(record: &StepRecord) {
    match &record.outcome {
        Outcome::Ok { output } => {
            println!("{} {}", "✓".green(), record.action.to_string().bold());
            if !output.trim().is_empty() && !record.action.is_finish() {
                println!("{}", preview(output).bright_black());
            }
        }
        Outcome::Err { kind, detail } => {
            println!(
                "{} {} {}",
                "✗".red(),
                record.action.to_string().bold(),
                format!("({})", kind).red()
            );
            println!("{}", preview(detail).bright_black());
        }
    }
}

pub fn print_report(report: &RunReport) {
    println!();
    println!("{} {}", "Goal:".bold(), report.goal);
    for (i, record) in report.steps.iter().enumerate() {
        let mark = if record.outcome.is_ok() { "✓".green() } else { "✗".red() };
        println!("  {:>2}. {} {}", i + 1, mark, record.action);
    }
    let elapsed = report.finished_at - report.started_at;
    match report.status {
        RunStatus::Done => {
            let summary = report.summary.as_deref().unwrap_or("goal reached");
            println!("{} {}", "Done:".green().bold(), summary);
        }
        _ => {
            let reason = report.failure.as_deref().unwrap_or("unknown");
            println!("{} {}", "Failed:".red().bold(), reason);
        }
    }
    println!(
        "{}",
        format!("{} steps in {}s", report.steps.len(), elapsed.num_seconds()).bright_black()
    );
}

fn preview(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= PREVIEW_LINES {
        return text.trim_end().to_string();
    }
    format!(
        "{}\n... ({} more lines)",
        lines[..PREVIEW_LINES].join("\n"),
        lines.len() - PREVIEW_LINES
    )
}

/// Asks on stdin, or approves everything when `auto_approve` is set
pub struct ConsolePermissions {
    auto_approve: bool,
}

impl ConsolePermissions {
    pub fn new(auto_approve: bool) -> Self {
        Self { auto_approve }
    }
}

impl Permissions for ConsolePermissions {
    fn confirm(&self, action: &Action) -> Decision {
        if self.auto_approve {
            return Decision::Allow;
        }

        if let Action::WriteFile { content, .. } = action {
            println!("{}", preview(content).bright_black());
        }
        print!("{} {} [y/N] ", "Allow".yellow().bold(), action.to_string().bold());
        if io::stdout().flush().is_err() {
            return Decision::Deny;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) if is_yes(&answer) => Decision::Allow,
            _ => Decision::Deny,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
