//! Gridsec Core Library
//!
//! Core types, errors and configuration shared by the gridsec security
//! manager: the privilege model of the data grid, the user and
//! authentication types handed back to the host, and the error taxonomy.

pub mod config;
pub mod error;
pub mod types;

pub use config::SecurityProperties;
pub use error::{AuthenticationFailure, AuthorityParseError, FailureKind, Result, SecurityError};

/// Gridsec version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Property naming the security context document to load
pub const SPRING_SECURITY_CONFIG_LOCATION: &str = "spring-security-config-location";

/// Context document used when no location is configured
pub const DEFAULT_CONFIG_LOCATION: &str = "security-config.xml";

/// Delimiter between authority rules in a group mapping
pub const AUTHORITY_MAP_DELIM: char = ',';
