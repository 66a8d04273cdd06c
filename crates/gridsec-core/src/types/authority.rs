//! Grid privileges and the authorities granting them
//!
//! An authority is written as a rule token:
//!
//! ```text
//! [Kind] PRIVILEGE [Filter value]
//! ```
//!
//! e.g. `GridPrivilege MANAGE_GRID`, `MONITOR_PU` or
//! `SpacePrivilege READ PackageFilter com.acme.orders`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AuthorityParseError;

// ============================================================================
// Privileges
// ============================================================================

/// Family a privilege belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrivilegeKind {
    System,
    Grid,
    Monitor,
    Space,
}

impl PrivilegeKind {
    pub const ALL: [PrivilegeKind; 4] = [
        PrivilegeKind::System,
        PrivilegeKind::Grid,
        PrivilegeKind::Monitor,
        PrivilegeKind::Space,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivilegeKind::System => "SystemPrivilege",
            PrivilegeKind::Grid => "GridPrivilege",
            PrivilegeKind::Monitor => "MonitorPrivilege",
            PrivilegeKind::Space => "SpacePrivilege",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for PrivilegeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single grid privilege.
///
/// Names are unique across kinds, so a privilege can be parsed without its
/// kind prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Privilege {
    // System
    ManageRoles,
    ManageUsers,
    // Grid
    ManageGrid,
    ManagePu,
    ProvisionPu,
    // Monitor
    MonitorJvm,
    MonitorPu,
    // Space
    Write,
    Create,
    Read,
    Take,
    Alter,
    Execute,
}

impl Privilege {
    pub const ALL: [Privilege; 13] = [
        Privilege::ManageRoles,
        Privilege::ManageUsers,
        Privilege::ManageGrid,
        Privilege::ManagePu,
        Privilege::ProvisionPu,
        Privilege::MonitorJvm,
        Privilege::MonitorPu,
        Privilege::Write,
        Privilege::Create,
        Privilege::Read,
        Privilege::Take,
        Privilege::Alter,
        Privilege::Execute,
    ];

    pub fn kind(&self) -> PrivilegeKind {
        match self {
            Privilege::ManageRoles | Privilege::ManageUsers => PrivilegeKind::System,
            Privilege::ManageGrid | Privilege::ManagePu | Privilege::ProvisionPu => {
                PrivilegeKind::Grid
            }
            Privilege::MonitorJvm | Privilege::MonitorPu => PrivilegeKind::Monitor,
            Privilege::Write
            | Privilege::Create
            | Privilege::Read
            | Privilege::Take
            | Privilege::Alter
            | Privilege::Execute => PrivilegeKind::Space,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::ManageRoles => "MANAGE_ROLES",
            Privilege::ManageUsers => "MANAGE_USERS",
            Privilege::ManageGrid => "MANAGE_GRID",
            Privilege::ManagePu => "MANAGE_PU",
            Privilege::ProvisionPu => "PROVISION_PU",
            Privilege::MonitorJvm => "MONITOR_JVM",
            Privilege::MonitorPu => "MONITOR_PU",
            Privilege::Write => "WRITE",
            Privilege::Create => "CREATE",
            Privilege::Read => "READ",
            Privilege::Take => "TAKE",
            Privilege::Alter => "ALTER",
            Privilege::Execute => "EXECUTE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Space filters
// ============================================================================

/// Narrows a space privilege to a subset of classes or spaces
#[derive(Debug, Clone)]
pub enum SpaceFilter {
    /// Exact class name
    Class(String),
    /// Every class below a package
    Package(String),
    /// Class names matching a regular expression
    Regex(Regex),
    /// A single space by name
    Space(String),
}

impl SpaceFilter {
    pub fn parse(name: &str, value: &str) -> Result<Self, AuthorityParseError> {
        match name {
            "ClassFilter" => Ok(SpaceFilter::Class(value.to_string())),
            "PackageFilter" => Ok(SpaceFilter::Package(value.to_string())),
            "RegexFilter" => Regex::new(value)
                .map(SpaceFilter::Regex)
                .map_err(|e| AuthorityParseError::InvalidRegex {
                    pattern: value.to_string(),
                    message: e.to_string(),
                }),
            "SpaceFilter" => Ok(SpaceFilter::Space(value.to_string())),
            other => Err(AuthorityParseError::UnknownFilter(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpaceFilter::Class(_) => "ClassFilter",
            SpaceFilter::Package(_) => "PackageFilter",
            SpaceFilter::Regex(_) => "RegexFilter",
            SpaceFilter::Space(_) => "SpaceFilter",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            SpaceFilter::Class(v) | SpaceFilter::Package(v) | SpaceFilter::Space(v) => v,
            SpaceFilter::Regex(re) => re.as_str(),
        }
    }

    pub fn matches(&self, subject: &str) -> bool {
        match self {
            SpaceFilter::Class(class) => subject == class,
            SpaceFilter::Package(package) => subject
                .strip_prefix(package.as_str())
                .is_some_and(|rest| rest.starts_with('.')),
            SpaceFilter::Regex(re) => re.is_match(subject),
            SpaceFilter::Space(space) => subject == space,
        }
    }
}

impl PartialEq for SpaceFilter {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.value() == other.value()
    }
}

impl Eq for SpaceFilter {}

// ============================================================================
// Authority
// ============================================================================

/// A privilege granted to a principal, optionally narrowed by a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    privilege: Privilege,
    filter: Option<SpaceFilter>,
}

impl Authority {
    pub fn new(privilege: Privilege) -> Self {
        Self {
            privilege,
            filter: None,
        }
    }

    pub fn with_filter(privilege: Privilege, filter: SpaceFilter) -> Self {
        Self {
            privilege,
            filter: Some(filter),
        }
    }

    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    pub fn kind(&self) -> PrivilegeKind {
        self.privilege.kind()
    }

    pub fn filter(&self) -> Option<&SpaceFilter> {
        self.filter.as_ref()
    }

    /// Unrestricted grant of `privilege`
    pub fn grants(&self, privilege: Privilege) -> bool {
        self.privilege == privilege && self.filter.is_none()
    }

    /// Grant of `privilege` covering `subject` (class or space name)
    pub fn grants_for(&self, privilege: Privilege, subject: &str) -> bool {
        self.privilege == privilege
            && self.filter.as_ref().map_or(true, |f| f.matches(subject))
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.privilege.kind(), self.privilege)?;
        if let Some(filter) = &self.filter {
            write!(f, " {} {}", filter.name(), filter.value())?;
        }
        Ok(())
    }
}

impl FromStr for Authority {
    type Err = AuthorityParseError;

    fn from_str(rule: &str) -> Result<Self, Self::Err> {
        let mut parts = rule.split_whitespace();
        let first = parts.next().ok_or(AuthorityParseError::Empty)?;

        let privilege = match PrivilegeKind::from_name(first) {
            Some(kind) => {
                let name = parts
                    .next()
                    .ok_or_else(|| AuthorityParseError::MissingPrivilege(first.to_string()))?;
                let privilege = Privilege::from_name(name)
                    .ok_or_else(|| AuthorityParseError::UnknownPrivilege(name.to_string()))?;
                if privilege.kind() != kind {
                    return Err(AuthorityParseError::KindMismatch {
                        kind: kind.to_string(),
                        privilege: name.to_string(),
                    });
                }
                privilege
            }
            None if first.ends_with("Privilege") => {
                return Err(AuthorityParseError::UnknownKind(first.to_string()));
            }
            None => Privilege::from_name(first)
                .ok_or_else(|| AuthorityParseError::UnknownPrivilege(first.to_string()))?,
        };

        let filter = match parts.next() {
            None => None,
            Some(_) if privilege.kind() != PrivilegeKind::Space => {
                return Err(AuthorityParseError::FilterNotSupported(
                    rule.trim().to_string(),
                ));
            }
            Some(name) => {
                let value = parts
                    .next()
                    .ok_or_else(|| AuthorityParseError::MissingFilterValue(name.to_string()))?;
                Some(SpaceFilter::parse(name, value)?)
            }
        };

        if let Some(extra) = parts.next() {
            return Err(AuthorityParseError::TrailingToken(extra.to_string()));
        }

        Ok(Self { privilege, filter })
    }
}

// ============================================================================
// Authority factory
// ============================================================================

/// Builds one authority from one rule token of a group mapping
pub trait AuthorityFactory: Send + Sync {
    fn create(&self, rule: &str) -> Result<Authority, AuthorityParseError>;
}

/// Factory understanding the `[Kind] PRIVILEGE [Filter value]` grammar
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivilegeAuthorityFactory;

impl AuthorityFactory for PrivilegeAuthorityFactory {
    fn create(&self, rule: &str) -> Result<Authority, AuthorityParseError> {
        rule.parse()
    }
}

// ============================================================================
// Granted authorities
// ============================================================================

/// Privilege checks over the authorities held by a principal
#[derive(Debug, Clone, Default)]
pub struct GrantedAuthorities {
    authorities: Vec<Authority>,
}

impl GrantedAuthorities {
    pub fn new(authorities: Vec<Authority>) -> Self {
        Self { authorities }
    }

    pub fn is_granted(&self, privilege: Privilege) -> bool {
        self.authorities.iter().any(|a| a.grants(privilege))
    }

    pub fn is_granted_for(&self, privilege: Privilege, subject: &str) -> bool {
        self.authorities
            .iter()
            .any(|a| a.grants_for(privilege, subject))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Authority> {
        self.authorities.iter()
    }

    pub fn len(&self) -> usize {
        self.authorities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authorities.is_empty()
    }
}
