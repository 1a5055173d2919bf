use crate::{ErrorKind, ErrorStatus};
use std::fmt;
use std::time::Duration;

/// Error returned by every anoncodex library function.
///
/// Carries what went wrong (`kind`), whether trying again makes sense
/// (`status`), where it happened (`operation`, plus the operations it passed
/// through as `called` context) and the wrapped cause.
///
/// ```rust
/// use anoncodex_error::{Error, ErrorKind, ErrorStatus};
///
/// let err = Error::unreachable("connection refused")
///     .with_operation("ollama::probe")
///     .with_context("base_url", "http://localhost:11434");
///
/// assert_eq!(err.kind(), ErrorKind::Unreachable);
/// assert_eq!(err.status(), ErrorStatus::Temporary);
/// assert_eq!(
///     err.to_string(),
///     "ollama::probe: Unreachable (temporary): connection refused [base_url=http://localhost:11434]"
/// );
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Status defaults to `Temporary` for retryable kinds, else `Permanent`
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: if kind.is_retryable() {
                ErrorStatus::Temporary
            } else {
                ErrorStatus::Permanent
            },
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    /// Innermost-last: the operation that saw the error most recently
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    /// Record the operation reporting this error. An earlier operation is
    /// kept as `called` context.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            let previous = std::mem::replace(&mut self.operation, operation);
            self.context.push(("called", previous.to_string()));
        } else {
            self.operation = operation;
        }
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Wrap the underlying cause. Set at most once.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "error source set twice");
        self.source = Some(source.into());
        self
    }

    /// Retries for this error ran out
    pub fn persist(mut self) -> Self {
        self.status = self.status.persist();
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }

    /// `Kind: message (hint)`, for the terminal rather than the log
    pub fn user_message(&self) -> String {
        let mut text = format!("{}: {}", self.kind, self.message);
        if let Some(hint) = self.kind.remediation() {
            text.push_str(&format!(" ({})", hint));
        }
        text
    }
}

/// One line: `operation: Kind (status): message [key=value, ...]`
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.operation.is_empty() {
            write!(f, "{}: ", self.operation)?;
        }
        write!(f, "{} ({})", self.kind, self.status)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(((first_key, first), rest)) = self.context.split_first() {
            write!(f, " [{}={}", first_key, first)?;
            for (key, value) in rest {
                write!(f, ", {}={}", key, value)?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Error");
        out.field("kind", &self.kind)
            .field("status", &self.status)
            .field("message", &self.message);
        if !self.operation.is_empty() {
            out.field("operation", &self.operation);
        }
        for (key, value) in &self.context {
            out.field(key, value);
        }
        if let Some(source) = &self.source {
            out.field("source", source);
        }
        out.finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        let kind = match err.kind() {
            Io::NotFound => ErrorKind::FileNotFound,
            Io::PermissionDenied => ErrorKind::PermissionDenied,
            Io::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string()).set_source(err)
    }
}

macro_rules! kind_constructors {
    ($($(#[$doc:meta])* $name:ident => $kind:ident;)*) => {
        impl Error {
            $(
                $(#[$doc])*
                pub fn $name(message: impl Into<String>) -> Self {
                    Self::new(ErrorKind::$kind, message)
                }
            )*
        }
    };
}

kind_constructors! {
    unexpected => Unexpected;
    /// Missing credential, empty base URL, unknown provider
    config_invalid => ConfigInvalid;
    unreachable => Unreachable;
    auth_failed => AuthFailed;
    rate_limited => RateLimited;
    bad_response => BadResponse;
    /// Any other provider failure; `message` is the provider's detail
    unknown => Unknown;
    invalid_action => InvalidAction;
}

impl Error {
    /// The permissions collaborator refused `action`
    pub fn denied(action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(ErrorKind::Denied, format!("not permitted: {}", action))
            .with_context("action", action)
    }

    /// `after` is printed as `300ms`, `1.5s` or `60s`
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::new(ErrorKind::Timeout, format!("'{}' timed out after {:?}", what.into(), after))
            .with_context("timeout_ms", after.as_millis().to_string())
    }
}
