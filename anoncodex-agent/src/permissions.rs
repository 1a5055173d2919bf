//! Permissions collaborator: the yes/no gate in front of actions.

use crate::action::Action;
use anoncodex_error::{Error, Result};
use regex::RegexSet;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Asked synchronously before an action is applied
pub trait Permissions {
    fn confirm(&self, action: &Action) -> Decision;
}

/// Approves everything (`--yes`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Permissions for AllowAll {
    fn confirm(&self, _action: &Action) -> Decision {
        Decision::Allow
    }
}

/// Refuses everything
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl Permissions for DenyAll {
    fn confirm(&self, _action: &Action) -> Decision {
        Decision::Deny
    }
}

/// Commands refused outright, whatever the user would say
const DANGEROUS_COMMANDS: &[&str] = &[
    r"(?i)\brm\s+(-\w+\s+)*-\w*(rf|fr)",
    r"(?i)\bdd\s+\w+=",
    r"(?i)\bmkfs(\.\w+)?\b",
    r"(?i)(^|[;&|]\s*)format\s+\w:",
    r"(?i)(^|[;&|]\s*)sudo\b",
    r"(?i)\bdel\s+/[sqa]\b",
    r"(?i)\brmdir\s+/[sq]\b",
    r"(?i)>\s*\S+\.(sh|bat|ps1|cmd)\b",
    r"(?i)\bregedit\b",
    r"(?i)\bgpedit(\.msc)?\b",
];

/// Refuses dangerous commands without asking and delegates the rest
pub struct GuardedPermissions<P> {
    inner: P,
    dangerous: RegexSet,
}

impl<P: Permissions> GuardedPermissions<P> {
    pub fn new(inner: P) -> Result<Self> {
        let dangerous = RegexSet::new(DANGEROUS_COMMANDS).map_err(|e| {
            Error::unexpected(format!("invalid command guard pattern: {}", e))
                .with_operation("permissions::new")
        })?;
        Ok(Self { inner, dangerous })
    }

    pub fn is_dangerous(&self, command: &str) -> bool {
        self.dangerous.is_match(command.trim())
    }
}

impl<P: Permissions> Permissions for GuardedPermissions<P> {
    fn confirm(&self, action: &Action) -> Decision {
        if let Action::RunCommand { command } = action {
            if self.is_dangerous(command) {
                warn!(command = %command, "refusing dangerous command");
                return Decision::Deny;
            }
        }
        self.inner.confirm(action)
    }
}
