//! Error types for gridsec

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SecurityError>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum SecurityError {
    // Lifecycle Errors
    #[error("Security configuration error: {0}")]
    Configuration(String),

    #[error("Security manager is not in a usable state: {0}")]
    IllegalState(String),

    // Access Errors
    #[error(transparent)]
    Authentication(#[from] AuthenticationFailure),

    #[error("Access denied: {0}")]
    AccessDenied(String),
}

impl SecurityError {
    pub fn code(&self) -> &'static str {
        match self {
            SecurityError::Configuration(_) => "ConfigurationError",
            SecurityError::IllegalState(_) => "IllegalState",
            SecurityError::Authentication(_) => "AuthenticationFailure",
            SecurityError::AccessDenied(_) => "AccessDenied",
        }
    }

    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, SecurityError::Authentication(_))
    }

    /// The authentication failure behind this error, if any
    pub fn as_authentication_failure(&self) -> Option<&AuthenticationFailure> {
        match self {
            SecurityError::Authentication(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Stage at which an authentication attempt failed.
///
/// Only meant for diagnostics. The caller-facing message of an
/// [`AuthenticationFailure`] is the same for every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The provider refused the credentials
    Rejected,
    /// The credentials were accepted but no group mapped to an authority
    NoAuthority,
    /// The provider or the authority factory raised an unexpected error
    Backend,
}

/// Failed authentication attempt
#[derive(Error, Debug)]
#[error("Authentication failed for user [{username}]")]
pub struct AuthenticationFailure {
    username: String,
    kind: FailureKind,
    detail: String,
    #[source]
    source: Option<BoxError>,
}

impl AuthenticationFailure {
    pub fn rejected(username: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            kind: FailureKind::Rejected,
            detail: reason.into(),
            source: None,
        }
    }

    pub fn no_authority(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            kind: FailureKind::NoAuthority,
            detail: "User does not belong to any authority".to_string(),
            source: None,
        }
    }

    pub fn backend(username: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        let cause = cause.into();
        Self {
            username: username.into(),
            kind: FailureKind::Backend,
            detail: cause.to_string(),
            source: Some(cause),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Diagnostic detail for logs; never shown to the caller
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// Errors raised while turning a rule token into an authority
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorityParseError {
    #[error("Authority rule is empty")]
    Empty,

    #[error("Unknown privilege kind: {0}")]
    UnknownKind(String),

    #[error("Missing privilege after {0}")]
    MissingPrivilege(String),

    #[error("Unknown privilege: {0}")]
    UnknownPrivilege(String),

    #[error("Privilege {privilege} does not belong to {kind}")]
    KindMismatch { kind: String, privilege: String },

    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("Filters are only supported on space privileges: {0}")]
    FilterNotSupported(String),

    #[error("Missing value for filter {0}")]
    MissingFilterValue(String),

    #[error("Invalid regex filter {pattern}: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("Unexpected token in authority rule: {0}")]
    TrailingToken(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_failure_message_hides_stage() {
        let rejected = AuthenticationFailure::rejected("alice", "invalid credentials");
        let empty = AuthenticationFailure::no_authority("alice");
        let backend = AuthenticationFailure::backend(
            "alice",
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
        );

        assert_eq!(rejected.to_string(), "Authentication failed for user [alice]");
        assert_eq!(rejected.to_string(), empty.to_string());
        assert_eq!(empty.to_string(), backend.to_string());
    }

    #[test]
    fn test_failure_diagnostics() {
        let empty = AuthenticationFailure::no_authority("bob");
        assert_eq!(empty.kind(), FailureKind::NoAuthority);
        assert_eq!(empty.detail(), "User does not belong to any authority");
        assert!(empty.source().is_none());

        let backend = AuthenticationFailure::backend(
            "bob",
            std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
        );
        assert_eq!(backend.kind(), FailureKind::Backend);
        assert_eq!(backend.source().map(|e| e.to_string()), Some("timed out".to_string()));
    }

    #[test]
    fn test_error_codes() {
        let err: SecurityError = AuthenticationFailure::rejected("carol", "denied").into();
        assert_eq!(err.code(), "AuthenticationFailure");
        assert!(err.is_authentication_failure());
        assert_eq!(err.as_authentication_failure().map(|f| f.username()), Some("carol"));

        assert_eq!(SecurityError::AccessDenied("no".into()).code(), "AccessDenied");
        assert_eq!(SecurityError::Configuration("bad".into()).code(), "ConfigurationError");
    }
}
