//! User types

use chrono::{DateTime, Utc};
use std::fmt;

use crate::types::{Authority, GrantedAuthorities};

/// A principal as seen by the grid: credentials plus granted authorities.
///
/// On an authentication request the authority list is empty; the security
/// manager hands back a copy carrying the mapped authorities.
#[derive(Clone, PartialEq, Eq)]
pub struct UserDetails {
    username: String,
    password: String,
    authorities: Vec<Authority>,
}

impl UserDetails {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            authorities: Vec::new(),
        }
    }

    pub fn with_authorities(mut self, authorities: Vec<Authority>) -> Self {
        self.authorities = authorities;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn authorities(&self) -> &[Authority] {
        &self.authorities
    }
}

impl fmt::Debug for UserDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDetails")
            .field("username", &self.username)
            .field("password", &"********")
            .field("authorities", &self.authorities)
            .finish()
    }
}

/// Outcome of a successful authentication
#[derive(Debug, Clone)]
pub struct Authentication {
    user: UserDetails,
    authenticated_at: DateTime<Utc>,
}

impl Authentication {
    pub fn new(user: UserDetails) -> Self {
        Self {
            user,
            authenticated_at: Utc::now(),
        }
    }

    pub fn user_details(&self) -> &UserDetails {
        &self.user
    }

    pub fn granted_authorities(&self) -> GrantedAuthorities {
        GrantedAuthorities::new(self.user.authorities.clone())
    }

    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }
}

/// User and role administration against the backing directory
pub trait DirectoryManager: Send + Sync {
    fn create_user(&self, user: &UserDetails) -> crate::Result<()>;
    fn delete_user(&self, username: &str) -> crate::Result<()>;
    fn create_role(&self, name: &str, authorities: &[Authority]) -> crate::Result<()>;
    fn delete_role(&self, name: &str) -> crate::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Privilege;

    #[test]
    fn test_debug_masks_password() {
        let user = UserDetails::new("alice", "s3cret");
        let debug = format!("{:?}", user);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_authentication_exposes_authorities() {
        let user = UserDetails::new("alice", "s3cret")
            .with_authorities(vec![Authority::new(Privilege::MonitorJvm)]);
        let auth = Authentication::new(user);

        assert_eq!(auth.user_details().username(), "alice");
        assert_eq!(auth.user_details().password(), "s3cret");
        assert!(auth.granted_authorities().is_granted(Privilege::MonitorJvm));
        assert!(auth.authenticated_at() <= Utc::now());
    }
}
