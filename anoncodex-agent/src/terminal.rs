//! Terminal collaborator: runs one shell command with a hard timeout.

use anoncodex_error::{Error, ErrorKind, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, the way a user would see them
    pub fn combined(&self) -> String {
        match (self.stdout.trim_end().is_empty(), self.stderr.trim_end().is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait Terminal {
    /// Run `command`, killing it once `timeout` elapses
    async fn run(&self, command: &str, timeout: Duration) -> Result<CommandOutput>;
}

/// Runs commands through the platform shell in a fixed directory
#[derive(Debug, Clone)]
pub struct ShellTerminal {
    cwd: PathBuf,
}

impl ShellTerminal {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    fn command(&self, line: &str) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(line);
            c
        };
        cmd.current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // the shell leads a fresh group so a timeout can take its children too
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

/// SIGKILL every process left in the group led by `pid`
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created for this command
    let rc = unsafe { libc::killpg(pid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pid, "could not kill process group: {}", err);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

impl Terminal for ShellTerminal {
    #[instrument(skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    async fn run(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        debug!("spawning shell command");
        let child = self.command(command).spawn().map_err(|e| {
            Error::new(ErrorKind::SpawnFailed, format!("could not start '{}': {}", command, e))
                .with_operation("terminal::run")
                .set_source(e)
        })?;

        let pid = child.id();

        // dropping the future drops the shell, and kill_on_drop reaps it
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| Error::from(e).with_operation("terminal::run"))?,
            Err(_) => {
                kill_group(pid);
                warn!(timeout_ms = timeout.as_millis() as u64, "command timed out, killed");
                return Err(Error::timeout(command, timeout).with_operation("terminal::run"));
            }
        };

        let out = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        debug!(exit_code = ?out.exit_code, "command finished");
        Ok(out)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_captures_stdout_stderr_and_exit_code() {
        let dir = TempDir::new().unwrap();
        let terminal = ShellTerminal::new(dir.path());

        let out = terminal
            .run("echo out; echo err 1>&2; exit 3", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
        assert_eq!(out.combined(), "out\nerr\n");
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let terminal = ShellTerminal::new(dir.path());

        let out = terminal.run("cat marker.txt", Duration::from_secs(10)).await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "here");
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let dir = TempDir::new().unwrap();
        let terminal = ShellTerminal::new(dir.path());

        let started = std::time::Instant::now();
        let err = terminal
            .run("sleep 30", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.message(), "'sleep 30' timed out after 200ms");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_timeout_kills_processes_the_shell_started() {
        let dir = TempDir::new().unwrap();
        let terminal = ShellTerminal::new(dir.path());

        // the inner shell is a child of the outer one and outlives it unless
        // the whole group is killed
        let err = terminal
            .run("sh -c 'sleep 1; touch survived.txt'; true", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        tokio::time::sleep(Duration::from_millis(1800)).await;
        assert!(!dir.path().join("survived.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_spawn_failure() {
        let terminal = ShellTerminal::new("/definitely/not/a/dir");
        let err = terminal.run("true", Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SpawnFailed);
    }

    #[test]
    fn test_combined_output() {
        let only_err = CommandOutput {
            stdout: String::new(),
            stderr: "boom\n".into(),
            exit_code: Some(1),
        };
        assert_eq!(only_err.combined(), "boom\n");
    }
}
