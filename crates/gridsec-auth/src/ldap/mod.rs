//! LDAP/Active Directory authentication module
//!
//! Provides enterprise authentication via:
//! - LDAP (OpenLDAP, 389 Directory Server)
//! - Microsoft Active Directory
//!
//! Features:
//! - User authentication (search-and-bind or direct UPN bind)
//! - Group membership lookup (group search or `memberOf`)
//! - TLS/STARTTLS support

mod client;
mod types;

pub use client::{LdapAuthProvider, LdapClient};
pub use types::*;
