//! Directory-backed authentication for Gridsec
//!
//! Verifies credentials against an external directory and maps the groups
//! the directory reports onto grid authorities.

pub mod bridge;
pub mod context;
pub mod ldap;
pub mod manager;
pub mod mapper;
pub mod provider;
pub mod static_provider;

pub use bridge::AuthenticationBridge;
pub use context::{
    ContextDocument, ContextFormat, ContextLoader, FileContextLoader, SecurityContext,
    DEFAULT_GROUP_MAPPER_NAME,
};
pub use ldap::{AttributeMappings, LdapAuthProvider, LdapClient, LdapConfig, LdapServerType};
pub use manager::{DirectorySecurityManager, ManagerState};
pub use mapper::{map_groups_to_authorities, GroupMapper, InvalidGroupMapping};
pub use provider::{
    AuthenticationOutcome, AuthenticationProvider, AuthenticationRequest,
    AuthenticationRequestFactory, ProviderError, RejectReason, UsernamePasswordRequestFactory,
};
pub use static_provider::{StaticAuthProvider, StaticProviderConfig, StaticUser};
