//! Typed actions and the fenced-block grammar the model uses to request them.
//!
//! A reply is free text with zero or more fenced blocks. A block whose info
//! string starts with one of the grammar keywords is an action; every other
//! fence is ordinary code and left alone.
//!
//! ````text
//! ```write_file src/main.rs
//! fn main() {}
//! ```
//! ```run cargo build
//! ```
//! ```finish Added an empty main
//! ```
//! ````

use serde::{Deserialize, Serialize};
use std::fmt;

/// One instruction extracted from a model reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    ReadFile { path: String },
    WriteFile { path: String, content: String },
    RunCommand { command: String },
    SearchCode { query: String },
    Finish { summary: String },
    /// Reply text with no recognisable action in it
    Unparsed { raw: String },
}

impl Action {
    pub fn read_file(path: impl Into<String>) -> Self {
        Action::ReadFile { path: path.into() }
    }

    pub fn write_file(path: impl Into<String>, content: impl Into<String>) -> Self {
        Action::WriteFile {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn run(command: impl Into<String>) -> Self {
        Action::RunCommand {
            command: command.into(),
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Action::SearchCode { query: query.into() }
    }

    pub fn finish(summary: impl Into<String>) -> Self {
        Action::Finish {
            summary: summary.into(),
        }
    }

    /// Writes and commands change the machine; they always need consent
    pub fn is_mutating(&self) -> bool {
        matches!(self, Action::WriteFile { .. } | Action::RunCommand { .. })
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Action::Finish { .. })
    }

    pub fn is_unparsed(&self) -> bool {
        matches!(self, Action::Unparsed { .. })
    }

    /// Short human description, used for permission prompts and logs
    pub fn describe(&self) -> String {
        match self {
            Action::ReadFile { path } => format!("read {}", path),
            Action::WriteFile { path, content } => {
                format!("write {} ({} bytes)", path, content.len())
            }
            Action::RunCommand { command } => format!("run `{}`", command),
            Action::SearchCode { query } => format!("search for '{}'", query),
            Action::Finish { .. } => "finish".to_string(),
            Action::Unparsed { .. } => "unparsed reply".to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

// ============================================================================
// Grammar
// ============================================================================

/// The marker vocabulary shared by the system prompt and the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerGrammar {
    pub read_file: String,
    pub write_file: String,
    pub run: String,
    pub search: String,
    pub finish: String,
    /// Accept ```` ```<start>:<end>:<path> ```` headers as whole-file writes
    pub legacy_ranges: bool,
}

impl Default for MarkerGrammar {
    fn default() -> Self {
        Self {
            read_file: "read_file".into(),
            write_file: "write_file".into(),
            run: "run".into(),
            search: "search".into(),
            finish: "finish".into(),
            legacy_ranges: true,
        }
    }
}

impl MarkerGrammar {
    pub fn without_legacy_ranges(mut self) -> Self {
        self.legacy_ranges = false;
        self
    }

    /// Instructions for the system prompt describing exactly what `parse`
    /// accepts
    pub fn instructions(&self) -> String {
        format!(
            "To act on the workspace, reply with fenced blocks. Each block is one action \
             and blocks run in the order you write them.\n\
             \n\
             Read a file:\n\
             ```{read} <path>\n\
             ```\n\
             \n\
             Create or replace a file with the complete new content:\n\
             ```{write} <path>\n\
             <full file content>\n\
             ```\n\
             \n\
             Run a shell command:\n\
             ```{run} <command>\n\
             ```\n\
             \n\
             Search the code (regular expression or plain text):\n\
             ```{search} <query>\n\
             ```\n\
             \n\
             Declare the task complete:\n\
             ```{finish} <one-line summary>\n\
             ```\n\
             \n\
             Text outside these blocks is shown to the user. Other fenced code is not executed.",
            read = self.read_file,
            write = self.write_file,
            run = self.run,
            search = self.search,
            finish = self.finish,
        )
    }

    /// Turn one fenced block into an action, if it is one
    fn action_for(&self, info: &str, body: &str) -> Option<Action> {
        let (keyword, argument) = match info.split_once(char::is_whitespace) {
            Some((k, a)) => (k, a.trim()),
            None => (info, ""),
        };
        let inline_or_body = || {
            if argument.is_empty() {
                body.trim().to_string()
            } else {
                argument.to_string()
            }
        };

        if keyword == self.read_file {
            let path = inline_or_body();
            (!path.is_empty()).then(|| Action::ReadFile { path })
        } else if keyword == self.write_file {
            (!argument.is_empty()).then(|| Action::write_file(argument, body))
        } else if keyword == self.run {
            let command = inline_or_body();
            (!command.is_empty()).then(|| Action::RunCommand { command })
        } else if keyword == self.search {
            let query = inline_or_body();
            (!query.is_empty()).then(|| Action::SearchCode { query })
        } else if keyword == self.finish {
            Some(Action::Finish {
                summary: inline_or_body(),
            })
        } else if self.legacy_ranges && argument.is_empty() {
            legacy_range_path(keyword).map(|path| Action::write_file(path, body))
        } else {
            None
        }
    }
}

/// `12:40:src/lib.rs` -> `src/lib.rs`
fn legacy_range_path(info: &str) -> Option<&str> {
    let mut parts = info.splitn(3, ':');
    let start = parts.next()?;
    let end = parts.next()?;
    let path = parts.next()?.trim();
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    (numeric(start) && numeric(end) && !path.is_empty()).then_some(path)
}

// ============================================================================
// Interpreter
// ============================================================================

/// Parses model replies into actions. Pure: the same text always yields the
/// same actions.
#[derive(Debug, Clone, Default)]
pub struct ActionInterpreter {
    grammar: MarkerGrammar,
}

impl ActionInterpreter {
    pub fn new(grammar: MarkerGrammar) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> &MarkerGrammar {
        &self.grammar
    }

    /// Actions in the order they appear, or a single `Unparsed` when the
    /// text holds none
    pub fn parse(&self, text: &str) -> Vec<Action> {
        let mut actions = Vec::new();
        let mut lines = text.lines();

        while let Some(line) = lines.next() {
            let Some(info) = line.trim_start().strip_prefix("```") else {
                continue;
            };
            let info = info.trim();

            let mut body: Vec<&str> = Vec::new();
            for inner in lines.by_ref() {
                if inner.trim() == "```" {
                    break;
                }
                body.push(inner);
            }

            if let Some(action) = self.grammar.action_for(info, &body.join("\n")) {
                actions.push(action);
            }
        }

        if actions.is_empty() {
            actions.push(Action::Unparsed {
                raw: text.to_string(),
            });
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<Action> {
        ActionInterpreter::default().parse(text)
    }

    #[test]
    fn test_no_markers_is_unparsed() {
        assert_eq!(
            parse("no markers here"),
            vec![Action::Unparsed {
                raw: "no markers here".into()
            }]
        );
        assert_eq!(parse(""), vec![Action::Unparsed { raw: String::new() }]);
    }

    #[test]
    fn test_actions_keep_source_order() {
        let text = "First I'll write it.\n\
                    ```write_file hello.py\n\
                    print('hi')\n\
                    ```\n\
                    Then run it:\n\
                    ```run python hello.py\n\
                    ```\n";
        assert_eq!(
            parse(text),
            vec![
                Action::write_file("hello.py", "print('hi')"),
                Action::run("python hello.py"),
            ]
        );
    }

    #[test]
    fn test_every_keyword() {
        let text = "```read_file src/lib.rs\n```\n\
                    ```search fn main\n```\n\
                    ```run\ncargo test --all\n```\n\
                    ```finish\nAll tests pass\n```";
        assert_eq!(
            parse(text),
            vec![
                Action::read_file("src/lib.rs"),
                Action::search("fn main"),
                Action::run("cargo test --all"),
                Action::finish("All tests pass"),
            ]
        );
    }

    #[test]
    fn test_write_keeps_body_verbatim() {
        let text = "```write_file a.txt\n  indented\n\nblank above\n```";
        assert_eq!(
            parse(text),
            vec![Action::write_file("a.txt", "  indented\n\nblank above")]
        );
    }

    #[test]
    fn test_ordinary_code_fences_are_ignored() {
        let text = "Here is an example:\n```rust\nfn main() {}\n```\n```finish done\n```";
        assert_eq!(parse(text), vec![Action::finish("done")]);

        let only_code = "```python\nprint(1)\n```";
        assert!(parse(only_code)[0].is_unparsed());
    }

    #[test]
    fn test_incomplete_blocks_are_ignored() {
        // write without a path, run without a command
        let text = "```write_file\ncontent\n```\n```run\n\n```";
        assert!(parse(text)[0].is_unparsed());
    }

    #[test]
    fn test_legacy_range_header() {
        let text = "```1:3:src/app.py\nimport os\n```";
        assert_eq!(parse(text), vec![Action::write_file("src/app.py", "import os")]);

        let strict = ActionInterpreter::new(MarkerGrammar::default().without_legacy_ranges());
        assert!(strict.parse(text)[0].is_unparsed());
        assert!(parse("```a:b:c\nx\n```")[0].is_unparsed());
    }

    #[test]
    fn test_unterminated_block_runs_to_end() {
        assert_eq!(
            parse("```write_file notes.md\nline one\nline two"),
            vec![Action::write_file("notes.md", "line one\nline two")]
        );
    }

    #[test]
    fn test_custom_keywords() {
        let grammar = MarkerGrammar {
            run: "shell".into(),
            ..MarkerGrammar::default()
        };
        let interpreter = ActionInterpreter::new(grammar);
        assert_eq!(interpreter.parse("```shell ls\n```"), vec![Action::run("ls")]);
        assert!(interpreter.parse("```run ls\n```")[0].is_unparsed());
        assert!(interpreter.grammar().instructions().contains("```shell <command>"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let interpreter = ActionInterpreter::default();
        let text = "```read_file a\n```\nsome prose\n```run make\n```";
        assert_eq!(interpreter.parse(text), interpreter.parse(text));
    }

    #[test]
    fn test_mutating_actions() {
        assert!(Action::write_file("a", "b").is_mutating());
        assert!(Action::run("ls").is_mutating());
        assert!(!Action::read_file("a").is_mutating());
        assert!(!Action::search("x").is_mutating());
        assert!(!Action::finish("").is_mutating());
    }

    #[test]
    fn test_instructions_mention_every_keyword() {
        let text = MarkerGrammar::default().instructions();
        for keyword in ["```read_file", "```write_file", "```run", "```search", "```finish"] {
            assert!(text.contains(keyword), "missing {}", keyword);
        }
    }
}
