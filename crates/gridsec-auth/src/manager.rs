//! Directory-backed security manager
//!
//! The entry point the data grid talks to. `init` loads a security context
//! and resolves exactly one authentication provider and one group mapper;
//! `authenticate` then runs through the [`AuthenticationBridge`]. Users and
//! roles live in the directory, so directory management is refused.
//!
//! Host configuration:
//!
//! ```text
//! spring-security-config-location = ../config/security/security-config.xml
//! ```

use gridsec_core::types::{
    Authentication, AuthorityFactory, DirectoryManager, PrivilegeAuthorityFactory, UserDetails,
};
use gridsec_core::{Result, SecurityError, SecurityProperties, SPRING_SECURITY_CONFIG_LOCATION};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use crate::bridge::AuthenticationBridge;
use crate::context::{ContextLoader, FileContextLoader, SecurityContext};
use crate::provider::{AuthenticationRequestFactory, UsernamePasswordRequestFactory};

/// Lifecycle state of a [`DirectorySecurityManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    Initialized,
    Closed,
}

enum State {
    Uninitialized,
    Initialized {
        context: SecurityContext,
        bridge: AuthenticationBridge,
    },
    Closed,
}

pub struct DirectorySecurityManager {
    loader: Arc<dyn ContextLoader>,
    authority_factory: Arc<dyn AuthorityFactory>,
    request_factory: Arc<dyn AuthenticationRequestFactory>,
    state: RwLock<State>,
}

impl Default for DirectorySecurityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectorySecurityManager {
    pub fn new() -> Self {
        Self {
            loader: Arc::new(FileContextLoader),
            authority_factory: Arc::new(PrivilegeAuthorityFactory),
            request_factory: Arc::new(UsernamePasswordRequestFactory),
            state: RwLock::new(State::Uninitialized),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ContextLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_authority_factory(mut self, factory: Arc<dyn AuthorityFactory>) -> Self {
        self.authority_factory = factory;
        self
    }

    pub fn with_request_factory(mut self, factory: Arc<dyn AuthenticationRequestFactory>) -> Self {
        self.request_factory = factory;
        self
    }

    pub fn state(&self) -> ManagerState {
        match &*self.state.read() {
            State::Uninitialized => ManagerState::Uninitialized,
            State::Initialized { .. } => ManagerState::Initialized,
            State::Closed => ManagerState::Closed,
        }
    }

    /// Initialize from the security context named in `properties`.
    ///
    /// On failure the manager stays uninitialized and `init` may be retried.
    pub fn init(&self, properties: &SecurityProperties) -> Result<()> {
        self.ensure_uninitialized()?;

        let location = properties.config_location();
        debug!(
            "{}: {}, absolute path: {}",
            SPRING_SECURITY_CONFIG_LOCATION,
            location,
            absolute_path(location)
        );

        let context = self.loader.load(location)?;
        self.init_with_context(context)
    }

    /// Initialize from an already built context
    pub fn init_with_context(&self, context: SecurityContext) -> Result<()> {
        let bridge = match self.build_bridge(&context) {
            Ok(bridge) => bridge,
            Err(e) => {
                context.shutdown();
                return Err(e);
            }
        };

        let mut state = self.state.write();
        if !matches!(*state, State::Uninitialized) {
            drop(state);
            context.shutdown();
            return Err(SecurityError::IllegalState(
                "security manager is already initialized or closed".to_string(),
            ));
        }

        info!("Security manager initialized from {}", context.location());
        *state = State::Initialized { context, bridge };
        Ok(())
    }

    /// Authenticate `user` against the configured provider
    pub async fn authenticate(&self, user: &UserDetails) -> Result<Authentication> {
        // The guard must not be held across the provider call
        let bridge = {
            let state = self.state.read();
            match &*state {
                State::Initialized { bridge, .. } => bridge.clone(),
                State::Uninitialized => {
                    return Err(SecurityError::IllegalState(
                        "security manager is not initialized".to_string(),
                    ));
                }
                State::Closed => {
                    return Err(SecurityError::IllegalState(
                        "security manager is closed".to_string(),
                    ));
                }
            }
        };

        Ok(bridge.authenticate(user).await?)
    }

    /// Always refused: users and roles are managed with the directory's own
    /// tools
    pub fn create_directory_manager(
        &self,
        _user: &UserDetails,
    ) -> Result<Box<dyn DirectoryManager>> {
        Err(SecurityError::AccessDenied(
            "user/role information should be managed by a compatible external directory tools."
                .to_string(),
        ))
    }

    /// Shut the context down. A no-op unless initialized.
    pub fn close(&self) {
        let previous = {
            let mut state = self.state.write();
            match *state {
                State::Initialized { .. } => std::mem::replace(&mut *state, State::Closed),
                _ => return,
            }
        };

        if let State::Initialized { context, .. } = previous {
            context.shutdown();
            info!("Security manager closed");
        }
    }

    fn ensure_uninitialized(&self) -> Result<()> {
        match &*self.state.read() {
            State::Uninitialized => Ok(()),
            State::Initialized { .. } => Err(SecurityError::IllegalState(
                "security manager is already initialized".to_string(),
            )),
            State::Closed => Err(SecurityError::IllegalState(
                "security manager is closed".to_string(),
            )),
        }
    }

    fn build_bridge(&self, context: &SecurityContext) -> Result<AuthenticationBridge> {
        let provider = context.resolve_provider()?;
        let group_mapper = context.resolve_group_mapper()?;

        group_mapper
            .validate(self.authority_factory.as_ref())
            .map_err(|e| SecurityError::Configuration(format!("{} in {}", e, context.location())))?;

        Ok(AuthenticationBridge::new(provider, group_mapper)
            .with_authority_factory(self.authority_factory.clone())
            .with_request_factory(self.request_factory.clone()))
    }
}

fn absolute_path(location: &str) -> String {
    std::env::current_dir()
        .map(|dir| dir.join(location).display().to_string())
        .unwrap_or_else(|_| location.to_string())
}
