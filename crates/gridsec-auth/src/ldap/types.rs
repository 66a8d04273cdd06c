//! LDAP/Active Directory types and configuration
//!
//! Supports:
//! - LDAP (OpenLDAP, 389 Directory Server) with search-and-bind
//! - Active Directory with direct UPN bind and `memberOf` groups
//! - TLS/STARTTLS connections

use ldap3::ldap_escape;
use serde::{Deserialize, Serialize};

// ============================================================================
// LDAP Configuration
// ============================================================================

/// LDAP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LdapConfig {
    /// LDAP server URL (ldap:// or ldaps://)
    /// Example: "ldap://ldap.example.com:389" or "ldaps://ldap.example.com:636"
    pub server_url: String,

    /// Use STARTTLS for connection upgrade
    #[serde(default)]
    pub start_tls: bool,

    /// Skip TLS certificate verification (not recommended for production)
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Active Directory domain. When set, users bind directly as
    /// `username@domain` and no service account is needed.
    /// Example: "corp.example.com"
    #[serde(default)]
    pub domain: Option<String>,

    /// Bind DN for LDAP queries (service account)
    /// Example: "cn=admin,dc=example,dc=com"
    #[serde(default)]
    pub bind_dn: String,

    /// Bind password
    #[serde(default)]
    pub bind_password: String,

    /// Base DN for user searches. Derived from `domain` when empty.
    /// Example: "ou=users,dc=example,dc=com"
    #[serde(default)]
    pub user_base_dn: String,

    /// User search filter
    /// Use {username} as placeholder
    /// Example: "(uid={username})" or "(sAMAccountName={username})"
    #[serde(default = "default_user_filter")]
    pub user_filter: String,

    /// Base DN for group searches
    /// Example: "ou=groups,dc=example,dc=com"
    #[serde(default)]
    pub group_base_dn: Option<String>,

    /// Group search filter
    /// Use {dn} as placeholder for user DN
    /// Example: "(member={dn})" or "(memberUid={username})"
    #[serde(default)]
    pub group_filter: Option<String>,

    /// LDAP attribute mappings
    #[serde(default)]
    pub attribute_mappings: AttributeMappings,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// LDAP server type hint
    #[serde(default)]
    pub server_type: LdapServerType,
}

fn default_user_filter() -> String {
    "(uid={username})".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            server_url: "ldap://localhost:389".to_string(),
            start_tls: false,
            skip_tls_verify: false,
            domain: None,
            bind_dn: String::new(),
            bind_password: String::new(),
            user_base_dn: String::new(),
            user_filter: default_user_filter(),
            group_base_dn: None,
            group_filter: None,
            attribute_mappings: AttributeMappings::default(),
            timeout_seconds: default_timeout(),
            server_type: LdapServerType::default(),
        }
    }
}

/// LDAP server type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LdapServerType {
    /// Generic LDAP server
    #[default]
    Ldap,
    /// Microsoft Active Directory
    ActiveDirectory,
    /// OpenLDAP
    OpenLdap,
    /// 389 Directory Server
    Directory389,
}

impl LdapServerType {
    /// Get default user filter for this server type
    pub fn default_user_filter(&self) -> &'static str {
        match self {
            LdapServerType::ActiveDirectory => "(sAMAccountName={username})",
            _ => "(uid={username})",
        }
    }

    /// Get default group filter for this server type
    pub fn default_group_filter(&self) -> &'static str {
        match self {
            LdapServerType::ActiveDirectory => "(member={dn})",
            _ => "(memberUid={username})",
        }
    }
}

/// LDAP attribute mappings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AttributeMappings {
    /// Username attribute
    #[serde(default = "default_username_attr")]
    pub username: String,

    /// Group name attribute
    #[serde(default = "default_group_name_attr")]
    pub group_name: String,

    /// Group membership attribute on the user entry
    #[serde(default = "default_member_of_attr")]
    pub member_of: String,
}

fn default_username_attr() -> String {
    "uid".to_string()
}

fn default_group_name_attr() -> String {
    "cn".to_string()
}

fn default_member_of_attr() -> String {
    "memberOf".to_string()
}

impl Default for AttributeMappings {
    fn default() -> Self {
        Self {
            username: default_username_attr(),
            group_name: default_group_name_attr(),
            member_of: default_member_of_attr(),
        }
    }
}

impl AttributeMappings {
    /// Get Active Directory default mappings
    pub fn active_directory() -> Self {
        Self {
            username: "sAMAccountName".to_string(),
            group_name: "cn".to_string(),
            member_of: "memberOf".to_string(),
        }
    }

    /// Get OpenLDAP default mappings
    pub fn openldap() -> Self {
        Self {
            username: "uid".to_string(),
            group_name: "cn".to_string(),
            member_of: "memberOf".to_string(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

impl LdapConfig {
    /// Build user search filter with username substitution
    pub fn build_user_filter(&self, username: &str) -> String {
        self.user_filter
            .replace("{username}", &ldap_escape(username))
    }

    /// Build group search filter with DN/username substitution
    pub fn build_group_filter(&self, user_dn: &str, username: &str) -> Option<String> {
        self.group_filter.as_ref().map(|f| {
            f.replace("{dn}", &ldap_escape(user_dn))
                .replace("{username}", &ldap_escape(username))
        })
    }

    /// User principal name for Active Directory binds
    pub fn user_principal_name(&self, username: &str) -> Option<String> {
        let domain = self.domain.as_ref()?;
        if username.contains('@') {
            Some(username.to_string())
        } else {
            Some(format!("{}@{}", username, domain))
        }
    }

    /// Base DN for user searches, derived from the domain when not set
    pub fn user_search_base(&self) -> String {
        if !self.user_base_dn.is_empty() {
            return self.user_base_dn.clone();
        }

        self.domain
            .as_deref()
            .map(root_dn_from_domain)
            .unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server_url.is_empty() {
            return Err("Server URL is required".to_string());
        }

        if !self.server_url.starts_with("ldap://") && !self.server_url.starts_with("ldaps://") {
            return Err("Server URL must start with ldap:// or ldaps://".to_string());
        }

        if let Some(domain) = &self.domain {
            if domain.trim().is_empty() {
                return Err("Domain must not be empty".to_string());
            }
            return Ok(());
        }

        if self.bind_dn.is_empty() {
            return Err("Bind DN is required".to_string());
        }

        if self.user_base_dn.is_empty() {
            return Err("User base DN is required".to_string());
        }

        if self.user_filter.is_empty() {
            return Err("User filter is required".to_string());
        }

        if !self.user_filter.contains("{username}") {
            return Err("User filter must contain {username} placeholder".to_string());
        }

        Ok(())
    }

    /// Create configuration from server type with sensible defaults
    pub fn from_server_type(server_type: LdapServerType, server_url: &str) -> Self {
        let mut config = Self {
            server_url: server_url.to_string(),
            server_type,
            ..Default::default()
        };

        match server_type {
            LdapServerType::ActiveDirectory => {
                config.user_filter = server_type.default_user_filter().to_string();
                config.group_filter = Some(server_type.default_group_filter().to_string());
                config.attribute_mappings = AttributeMappings::active_directory();
            }
            LdapServerType::OpenLdap | LdapServerType::Directory389 => {
                config.user_filter = server_type.default_user_filter().to_string();
                config.group_filter = Some(server_type.default_group_filter().to_string());
                config.attribute_mappings = AttributeMappings::openldap();
            }
            LdapServerType::Ldap => {
                // Use defaults
            }
        }

        config
    }
}

/// `corp.example.com` -> `dc=corp,dc=example,dc=com`
pub fn root_dn_from_domain(domain: &str) -> String {
    domain
        .split('.')
        .filter(|part| !part.is_empty())
        .map(|part| format!("dc={}", part))
        .collect::<Vec<_>>()
        .join(",")
}

/// Common name of a group DN, as reported in `memberOf`.
///
/// `CN=Domain Admins,CN=Users,DC=corp,DC=example,DC=com` -> `Domain Admins`.
/// Values that are not DNs are returned unchanged.
pub fn group_name_from_dn(dn: &str) -> String {
    let first_rdn = split_first_rdn(dn);
    match first_rdn.split_once('=') {
        Some((attr, value)) if attr.trim().eq_ignore_ascii_case("cn") => {
            unescape_rdn_value(value.trim())
        }
        _ => dn.trim().to_string(),
    }
}

fn split_first_rdn(dn: &str) -> &str {
    let mut escaped = false;
    for (idx, ch) in dn.char_indices() {
        match ch {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => return &dn[..idx],
            _ => escaped = false,
        }
    }
    dn
}

/// Undo RFC 4514 escaping: `\,` style and `\2C` hex pairs (UTF-8 bytes)
fn unescape_rdn_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        match bytes.get(i + 1..i + 3).and_then(hex_byte) {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                if let Some(&next) = bytes.get(i + 1) {
                    out.push(next);
                }
                i += 2;
            }
        }
    }

    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn hex_byte(pair: &[u8]) -> Option<u8> {
    let pair = std::str::from_utf8(pair).ok()?;
    if !pair.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(pair, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_filter_building() {
        let config = LdapConfig {
            user_filter: "(uid={username})".to_string(),
            ..Default::default()
        };

        assert_eq!(config.build_user_filter("john"), "(uid=john)");
        assert_eq!(config.build_user_filter("j*)(uid=*"), "(uid=j\\2a\\29\\28uid=\\2a)");
    }

    #[test]
    fn test_group_filter_building() {
        let config = LdapConfig {
            group_filter: Some("(member={dn})".to_string()),
            ..Default::default()
        };

        assert_eq!(
            config.build_group_filter("uid=john,ou=users,dc=example,dc=com", "john"),
            Some("(member=uid=john,ou=users,dc=example,dc=com)".to_string())
        );
        assert_eq!(LdapConfig::default().build_group_filter("dn", "john"), None);
    }

    #[test]
    fn test_config_validation() {
        let mut config = LdapConfig {
            server_url: String::new(),
            ..Default::default()
        };

        // Should fail - empty server URL
        assert!(config.validate().is_err());

        config.server_url = "http://localhost:389".to_string();
        assert!(config.validate().is_err());

        config.server_url = "ldap://localhost:389".to_string();
        assert!(config.validate().is_err());

        config.bind_dn = "cn=admin,dc=example,dc=com".to_string();
        config.user_base_dn = "ou=users,dc=example,dc=com".to_string();

        // Should pass now
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_domain_config_needs_no_service_account() {
        let config = LdapConfig {
            server_url: "ldaps://dc.corp.example.com:636".to_string(),
            domain: Some("corp.example.com".to_string()),
            ..Default::default()
        };

        assert!(config.validate().is_ok());
        assert_eq!(
            config.user_principal_name("alice"),
            Some("alice@corp.example.com".to_string())
        );
        assert_eq!(
            config.user_principal_name("alice@other.example.com"),
            Some("alice@other.example.com".to_string())
        );
        assert_eq!(config.user_search_base(), "dc=corp,dc=example,dc=com");
    }

    #[test]
    fn test_active_directory_defaults() {
        let config = LdapConfig::from_server_type(
            LdapServerType::ActiveDirectory,
            "ldaps://dc.example.com:636",
        );

        assert_eq!(config.user_filter, "(sAMAccountName={username})");
        assert_eq!(config.group_filter.as_deref(), Some("(member={dn})"));
        assert_eq!(config.attribute_mappings.username, "sAMAccountName");
    }

    #[test]
    fn test_group_name_from_dn() {
        assert_eq!(
            group_name_from_dn("CN=Administrators,CN=Builtin,DC=corp,DC=example,DC=com"),
            "Administrators"
        );
        assert_eq!(
            group_name_from_dn("cn=Cache\\, Users,ou=groups,dc=example,dc=com"),
            "Cache, Users"
        );
        assert_eq!(
            group_name_from_dn("CN=Cache\\2C Users,OU=Groups,DC=example,DC=com"),
            "Cache, Users"
        );
        assert_eq!(
            group_name_from_dn("cn=Op\\C3\\A9rateurs,ou=groups,dc=example,dc=com"),
            "Op\u{e9}rateurs"
        );
        assert_eq!(group_name_from_dn("CN=\\23Ops,DC=corp"), "#Ops");
        assert_eq!(group_name_from_dn("Deployers"), "Deployers");
        assert_eq!(
            group_name_from_dn("OU=Deployers,DC=corp,DC=com"),
            "OU=Deployers,DC=corp,DC=com"
        );
    }
}
