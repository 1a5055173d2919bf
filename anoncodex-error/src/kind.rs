//! Error kinds for anoncodex operations

use std::fmt;

/// The kind of error that occurred.
///
/// Controllers branch on the kind only. The five provider kinds
/// (`Unreachable`, `AuthFailed`, `RateLimited`, `BadResponse`, `Unknown`)
/// are the whole vocabulary a model gateway is allowed to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// Bug or state the code did not plan for
    Unexpected,

    /// Missing or invalid configuration (credentials, base URL, model)
    ConfigInvalid,

    // =========================================================================
    // Provider errors
    // =========================================================================
    /// Endpoint did not answer: connection refused, timeout, 5xx
    Unreachable,

    /// Credentials were rejected
    AuthFailed,

    /// Provider asked us to slow down
    RateLimited,

    /// Response arrived but could not be understood
    BadResponse,

    /// Any other provider failure; the message carries the detail
    Unknown,

    // =========================================================================
    // Action errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied by the operating system
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Command or request exceeded its time bound
    Timeout,

    /// Command could not be started
    SpawnFailed,

    /// Command ran but exited unsuccessfully
    CommandFailed,

    /// The user (or the permission guard) refused the action
    Denied,

    /// The action cannot be applied (e.g. unparsed model output)
    InvalidAction,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::ConfigInvalid => "ConfigInvalid",

            // Provider
            ErrorKind::Unreachable => "Unreachable",
            ErrorKind::AuthFailed => "AuthFailed",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::BadResponse => "BadResponse",
            ErrorKind::Unknown => "Unknown",

            // Action
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::SpawnFailed => "SpawnFailed",
            ErrorKind::CommandFailed => "CommandFailed",
            ErrorKind::Denied => "Denied",
            ErrorKind::InvalidAction => "InvalidAction",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Unreachable | ErrorKind::RateLimited)
    }

    /// True for the kinds a model gateway may return
    pub fn is_provider_kind(&self) -> bool {
        matches!(
            self,
            ErrorKind::Unreachable
                | ErrorKind::AuthFailed
                | ErrorKind::RateLimited
                | ErrorKind::BadResponse
                | ErrorKind::Unknown
        )
    }

    /// A short hint shown next to terminal provider failures
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            ErrorKind::ConfigInvalid => {
                Some("check the API key / base URL for the selected provider")
            }
            ErrorKind::AuthFailed => {
                Some("the API key was rejected; verify it is valid and has access to the model")
            }
            ErrorKind::Unreachable => {
                Some("is the provider endpoint reachable (and the local server running)?")
            }
            ErrorKind::RateLimited => {
                Some("the provider is rate limiting requests; wait and retry")
            }
            ErrorKind::BadResponse => {
                Some("the provider returned an unexpected payload; try another model")
            }
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::RateLimited.to_string(), "RateLimited");
        assert_eq!(ErrorKind::Denied.to_string(), "Denied");
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::Unreachable.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::AuthFailed.is_retryable());
        assert!(!ErrorKind::BadResponse.is_retryable());
        assert!(!ErrorKind::Timeout.is_retryable());
    }

    #[test]
    fn test_provider_kinds() {
        assert!(ErrorKind::Unknown.is_provider_kind());
        assert!(!ErrorKind::Denied.is_provider_kind());
        assert!(!ErrorKind::ConfigInvalid.is_provider_kind());
    }
}
