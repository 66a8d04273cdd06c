//! In-memory authentication provider
//!
//! Users, passwords and group memberships come straight from the security
//! context document. Handy for trying out a group mapping without a
//! directory server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::provider::{
    AuthenticationOutcome, AuthenticationProvider, AuthenticationRequest, ProviderError,
    RejectReason,
};

/// Static provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticProviderConfig {
    #[serde(default, rename = "user")]
    pub users: Vec<StaticUser>,
}

/// A configured user
#[derive(Clone, Serialize, Deserialize)]
pub struct StaticUser {
    pub username: String,
    pub password: String,
    #[serde(default, rename = "group")]
    pub groups: Vec<String>,
}

impl fmt::Debug for StaticUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticUser")
            .field("username", &self.username)
            .field("password", &"********")
            .field("groups", &self.groups)
            .finish()
    }
}

pub struct StaticAuthProvider {
    users: HashMap<String, StaticUser>,
}

impl StaticAuthProvider {
    pub fn new(users: impl IntoIterator<Item = StaticUser>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|u| (u.username.clone(), u))
                .collect(),
        }
    }

    pub fn from_config(config: &StaticProviderConfig) -> Self {
        Self::new(config.users.iter().cloned())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl AuthenticationProvider for StaticAuthProvider {
    async fn authenticate(
        &self,
        request: &AuthenticationRequest,
    ) -> Result<AuthenticationOutcome, ProviderError> {
        let outcome = match self.users.get(&request.principal) {
            None => AuthenticationOutcome::rejected(RejectReason::UserNotFound),
            Some(user) if user.password != request.credentials => {
                AuthenticationOutcome::rejected(RejectReason::InvalidCredentials)
            }
            Some(user) => {
                AuthenticationOutcome::authenticated(user.username.clone(), user.groups.clone())
            }
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> StaticAuthProvider {
        StaticAuthProvider::new([StaticUser {
            username: "alice".to_string(),
            password: "wonderland".to_string(),
            groups: vec!["Administrators".to_string()],
        }])
    }

    #[tokio::test]
    async fn test_valid_credentials() {
        let outcome = provider()
            .authenticate(&AuthenticationRequest::new("alice", "wonderland"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            AuthenticationOutcome::authenticated("alice", vec!["Administrators".to_string()])
        );
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let outcome = provider()
            .authenticate(&AuthenticationRequest::new("alice", "looking-glass"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            AuthenticationOutcome::rejected(RejectReason::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let outcome = provider()
            .authenticate(&AuthenticationRequest::new("bob", "wonderland"))
            .await
            .unwrap();

        assert_eq!(outcome, AuthenticationOutcome::rejected(RejectReason::UserNotFound));
    }
}
