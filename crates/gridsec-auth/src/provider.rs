//! Authentication provider abstraction
//!
//! A provider performs the actual credential check against a backend (LDAP,
//! Active Directory, an in-memory user list) and reports the groups the
//! principal belongs to. Everything after that is handled by the bridge.

use async_trait::async_trait;
use gridsec_core::types::UserDetails;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Request
// ============================================================================

/// Request handed to an [`AuthenticationProvider`]
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticationRequest {
    pub principal: String,
    pub credentials: String,
    /// Extra provider-specific attributes, e.g. a domain hint
    pub details: HashMap<String, String>,
}

impl AuthenticationRequest {
    pub fn new(principal: impl Into<String>, credentials: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            credentials: credentials.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(|s| s.as_str())
    }
}

impl fmt::Debug for AuthenticationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationRequest")
            .field("principal", &self.principal)
            .field("credentials", &"********")
            .field("details", &self.details)
            .finish()
    }
}

/// Builds the provider request for each authentication attempt.
///
/// Plain closures `Fn(&UserDetails) -> AuthenticationRequest` implement this
/// trait as well.
pub trait AuthenticationRequestFactory: Send + Sync {
    fn create_request(&self, user: &UserDetails) -> AuthenticationRequest;
}

/// Pairs the username with the password
#[derive(Debug, Clone, Copy, Default)]
pub struct UsernamePasswordRequestFactory;

impl AuthenticationRequestFactory for UsernamePasswordRequestFactory {
    fn create_request(&self, user: &UserDetails) -> AuthenticationRequest {
        AuthenticationRequest::new(user.username(), user.password())
    }
}

impl<F> AuthenticationRequestFactory for F
where
    F: Fn(&UserDetails) -> AuthenticationRequest + Send + Sync,
{
    fn create_request(&self, user: &UserDetails) -> AuthenticationRequest {
        self(user)
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Why a provider refused the credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Wrong password
    InvalidCredentials,
    /// No such principal
    UserNotFound,
    /// Account disabled/locked
    AccountDisabled,
    /// The backend answered without authenticating the principal
    NotAuthenticated,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RejectReason::InvalidCredentials => "invalid credentials",
            RejectReason::UserNotFound => "user not found",
            RejectReason::AccountDisabled => "account disabled",
            RejectReason::NotAuthenticated => "not authenticated",
        };
        f.write_str(reason)
    }
}

/// Result of one provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationOutcome {
    /// Credentials accepted
    Authenticated {
        principal: String,
        /// Group names reported by the backend, e.g. AD `memberOf` CNs
        groups: Vec<String>,
    },
    /// Credentials refused
    Rejected { reason: RejectReason },
}

impl AuthenticationOutcome {
    pub fn authenticated(principal: impl Into<String>, groups: Vec<String>) -> Self {
        AuthenticationOutcome::Authenticated {
            principal: principal.into(),
            groups,
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        AuthenticationOutcome::Rejected { reason }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthenticationOutcome::Authenticated { .. })
    }
}

/// Unexpected provider failures, as opposed to a refused credential
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Directory protocol error: {0}")]
    Protocol(String),

    #[error("Provider configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ============================================================================
// Provider
// ============================================================================

/// Backend performing the credential check
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// Check the credentials of `request`.
    ///
    /// A wrong password is an `Ok(Rejected)`; `Err` is reserved for failures
    /// of the backend itself.
    async fn authenticate(
        &self,
        request: &AuthenticationRequest,
    ) -> Result<AuthenticationOutcome, ProviderError>;

    /// Release backend resources. Called once when the owning context shuts
    /// down.
    fn shutdown(&self) {}
}
