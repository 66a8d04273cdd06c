//! Authentication bridge
//!
//! Runs one authentication attempt: builds the provider request, calls the
//! provider once, maps the reported groups and packages the result. Every
//! failure comes back as an [`AuthenticationFailure`] with the same
//! caller-facing message; the stage that failed is only visible through
//! [`AuthenticationFailure::kind`] and the trace log.

use gridsec_core::types::{Authentication, AuthorityFactory, PrivilegeAuthorityFactory, UserDetails};
use gridsec_core::AuthenticationFailure;
use std::error::Error as _;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::mapper::GroupMapper;
use crate::provider::{
    AuthenticationOutcome, AuthenticationProvider, AuthenticationRequestFactory,
    UsernamePasswordRequestFactory,
};

#[derive(Clone)]
pub struct AuthenticationBridge {
    provider: Arc<dyn AuthenticationProvider>,
    group_mapper: Arc<GroupMapper>,
    authority_factory: Arc<dyn AuthorityFactory>,
    request_factory: Arc<dyn AuthenticationRequestFactory>,
}

impl AuthenticationBridge {
    pub fn new(provider: Arc<dyn AuthenticationProvider>, group_mapper: Arc<GroupMapper>) -> Self {
        Self {
            provider,
            group_mapper,
            authority_factory: Arc::new(PrivilegeAuthorityFactory),
            request_factory: Arc::new(UsernamePasswordRequestFactory),
        }
    }

    pub fn with_authority_factory(mut self, factory: Arc<dyn AuthorityFactory>) -> Self {
        self.authority_factory = factory;
        self
    }

    pub fn with_request_factory(mut self, factory: Arc<dyn AuthenticationRequestFactory>) -> Self {
        self.request_factory = factory;
        self
    }

    pub fn group_mapper(&self) -> &GroupMapper {
        &self.group_mapper
    }

    /// Authenticate `user`, returning the user with its mapped authorities
    pub async fn authenticate(
        &self,
        user: &UserDetails,
    ) -> Result<Authentication, AuthenticationFailure> {
        let result = self.try_authenticate(user).await;

        if let Err(failure) = &result {
            trace!(
                username = failure.username(),
                kind = ?failure.kind(),
                detail = failure.detail(),
                cause = ?failure.source(),
                "Caught failure upon authentication"
            );
        }

        result
    }

    async fn try_authenticate(
        &self,
        user: &UserDetails,
    ) -> Result<Authentication, AuthenticationFailure> {
        let username = user.username();
        let request = self.request_factory.create_request(user);

        let outcome = self
            .provider
            .authenticate(&request)
            .await
            .map_err(|e| AuthenticationFailure::backend(username, e))?;

        let groups = match outcome {
            AuthenticationOutcome::Authenticated { groups, .. } => groups,
            AuthenticationOutcome::Rejected { reason } => {
                return Err(AuthenticationFailure::rejected(username, reason.to_string()));
            }
        };

        debug!("User [{}] reported {} group(s)", username, groups.len());

        let authorities = self
            .group_mapper
            .map(&groups, self.authority_factory.as_ref())
            .map_err(|e| AuthenticationFailure::backend(username, e))?;

        if authorities.is_empty() {
            return Err(AuthenticationFailure::no_authority(username));
        }

        debug!(
            "User [{}] authenticated with {} authorities",
            username,
            authorities.len()
        );

        let user = UserDetails::new(username, user.password()).with_authorities(authorities);
        Ok(Authentication::new(user))
    }
}
