//! LDAP Client implementation
//!
//! Handles LDAP connections, credential verification and group lookups.
//! Supports LDAP, LDAPS (SSL), and STARTTLS connections.

use crate::ldap::types::*;
use crate::provider::{
    AuthenticationOutcome, AuthenticationProvider, AuthenticationRequest, ProviderError,
    RejectReason,
};
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result code for invalid credentials
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Result code for unwilling to perform (disabled/locked accounts)
const RC_UNWILLING_TO_PERFORM: u32 = 53;

/// LDAP Client for authentication
pub struct LdapClient {
    config: LdapConfig,
}

impl LdapClient {
    /// Create a new LDAP client
    pub fn new(config: LdapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Authenticate a user with username and password
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationOutcome, ProviderError> {
        self.config.validate().map_err(ProviderError::Configuration)?;

        // An empty password would turn the user bind into an anonymous bind
        if password.is_empty() {
            return Ok(AuthenticationOutcome::rejected(RejectReason::InvalidCredentials));
        }

        match self.config.user_principal_name(username) {
            Some(upn) => self.ad_authenticate(username, &upn, password).await,
            None => self.search_and_bind(username, password).await,
        }
    }

    // =========================================================================
    // Private methods - Real LDAP implementation
    // =========================================================================

    /// Create LDAP connection with proper TLS settings
    async fn create_connection(&self) -> Result<(LdapConnAsync, Ldap), ProviderError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(self.config.timeout_seconds))
            .set_starttls(self.config.start_tls)
            .set_no_tls_verify(self.config.skip_tls_verify);

        debug!("Connecting to LDAP server: {}", self.config.server_url);

        LdapConnAsync::with_settings(settings, &self.config.server_url)
            .await
            .map_err(|e| ProviderError::Connection(format!("Failed to connect to LDAP server: {}", e)))
    }

    /// Active Directory: bind as `user@domain`, then read `memberOf`
    async fn ad_authenticate(
        &self,
        username: &str,
        upn: &str,
        password: &str,
    ) -> Result<AuthenticationOutcome, ProviderError> {
        let (conn, mut ldap) = self.create_connection().await?;
        ldap3::drive!(conn);

        let bind = ldap
            .simple_bind(upn, password)
            .await
            .map_err(|e| ProviderError::Connection(format!("User bind failed: {}", e)))?;

        if bind.rc != 0 {
            let _ = ldap.unbind().await;
            return Ok(AuthenticationOutcome::rejected(reject_reason(bind.rc)));
        }

        let filter = format!(
            "(&(objectClass=user)(userPrincipalName={}))",
            ldap3::ldap_escape(upn)
        );
        let base = self.config.user_search_base();

        debug!("Searching for user with filter: {}", filter);

        let (rs, _res) = ldap
            .search(
                &base,
                Scope::Subtree,
                &filter,
                vec![
                    &self.config.attribute_mappings.username as &str,
                    &self.config.attribute_mappings.member_of,
                ],
            )
            .await
            .map_err(|e| ProviderError::Protocol(format!("User search failed: {}", e)))?
            .success()
            .map_err(|e| ProviderError::Protocol(format!("User search error: {}", e)))?;

        let _ = ldap.unbind().await;

        let Some(result) = rs.into_iter().next() else {
            return Ok(AuthenticationOutcome::rejected(RejectReason::UserNotFound));
        };

        let entry = SearchEntry::construct(result);
        let groups = self.member_of_groups(&entry);

        debug!("Found {} groups for user {}", groups.len(), username);

        Ok(AuthenticationOutcome::authenticated(username, groups))
    }

    /// Generic LDAP: service bind, user search, user bind, group search
    async fn search_and_bind(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationOutcome, ProviderError> {
        // Step 1: Connect and bind with service account
        let (conn, mut ldap) = self.create_connection().await?;
        ldap3::drive!(conn);

        let result = ldap
            .simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| ProviderError::Connection(format!("Service bind failed: {}", e)))?;

        if result.rc != 0 {
            return Err(ProviderError::Configuration(format!(
                "Service account bind failed with code: {}",
                result.rc
            )));
        }

        // Step 2: Search for user
        let filter = self.config.build_user_filter(username);

        debug!("Searching for user with filter: {}", filter);

        let (rs, _res) = ldap
            .search(
                &self.config.user_base_dn,
                Scope::Subtree,
                &filter,
                vec![
                    &self.config.attribute_mappings.username as &str,
                    &self.config.attribute_mappings.member_of,
                ],
            )
            .await
            .map_err(|e| ProviderError::Protocol(format!("User search failed: {}", e)))?
            .success()
            .map_err(|e| ProviderError::Protocol(format!("User search error: {}", e)))?;

        let Some(result) = rs.into_iter().next() else {
            let _ = ldap.unbind().await;
            return Ok(AuthenticationOutcome::rejected(RejectReason::UserNotFound));
        };

        let entry = SearchEntry::construct(result);
        let user_dn = entry.dn.clone();

        debug!("Found user DN: {}", user_dn);

        // Step 3: Verify user password by binding as the user
        let (conn2, mut ldap2) = self.create_connection().await?;
        ldap3::drive!(conn2);

        let user_bind = ldap2
            .simple_bind(&user_dn, password)
            .await
            .map_err(|e| ProviderError::Connection(format!("User bind failed: {}", e)))?;

        let _ = ldap2.unbind().await;

        if user_bind.rc != 0 {
            let _ = ldap.unbind().await;
            return Ok(AuthenticationOutcome::rejected(reject_reason(user_bind.rc)));
        }

        // Step 4: Get user groups
        let groups = match self
            .ldap_get_groups_with_connection(&mut ldap, &user_dn, username)
            .await
        {
            Ok(Some(groups)) => groups,
            Ok(None) => self.member_of_groups(&entry),
            Err(e) => {
                let _ = ldap.unbind().await;
                return Err(e);
            }
        };

        let _ = ldap.unbind().await;

        debug!("Found {} groups for user {}", groups.len(), username);

        Ok(AuthenticationOutcome::authenticated(username, groups))
    }

    /// Group search; `None` when no group base/filter is configured
    async fn ldap_get_groups_with_connection(
        &self,
        ldap: &mut Ldap,
        user_dn: &str,
        username: &str,
    ) -> Result<Option<Vec<String>>, ProviderError> {
        let group_base = match &self.config.group_base_dn {
            Some(base) => base,
            None => return Ok(None),
        };

        let filter = match self.config.build_group_filter(user_dn, username) {
            Some(f) => f,
            None => return Ok(None),
        };

        debug!("Searching groups with filter: {}", filter);

        let (rs, _res) = ldap
            .search(
                group_base,
                Scope::Subtree,
                &filter,
                vec![&self.config.attribute_mappings.group_name as &str],
            )
            .await
            .map_err(|e| ProviderError::Protocol(format!("Group search failed: {}", e)))?
            .success()
            .map_err(|e| ProviderError::Protocol(format!("Group search error: {}", e)))?;

        let mut groups = Vec::new();
        for result in rs {
            let entry = SearchEntry::construct(result);
            if let Some(name) = get_first_attr(&entry, &self.config.attribute_mappings.group_name) {
                groups.push(name);
            }
        }

        Ok(Some(groups))
    }

    fn member_of_groups(&self, entry: &SearchEntry) -> Vec<String> {
        entry
            .attrs
            .get(&self.config.attribute_mappings.member_of)
            .map(|values| values.iter().map(|dn| group_name_from_dn(dn)).collect())
            .unwrap_or_default()
    }
}

fn reject_reason(rc: u32) -> RejectReason {
    match rc {
        RC_INVALID_CREDENTIALS => RejectReason::InvalidCredentials,
        RC_UNWILLING_TO_PERFORM => RejectReason::AccountDisabled,
        other => {
            warn!("LDAP bind refused with unexpected result code: {}", other);
            RejectReason::InvalidCredentials
        }
    }
}

/// Helper to get first attribute value from LDAP entry
fn get_first_attr(entry: &SearchEntry, attr: &str) -> Option<String> {
    entry.attrs.get(attr).and_then(|v| v.first().cloned())
}

/// LDAP authentication provider for integration with the security manager
pub struct LdapAuthProvider {
    client: Arc<LdapClient>,
}

impl LdapAuthProvider {
    /// Create a new LDAP auth provider
    pub fn new(config: LdapConfig) -> Self {
        Self {
            client: Arc::new(LdapClient::new(config)),
        }
    }

    /// Get underlying client
    pub fn client(&self) -> Arc<LdapClient> {
        self.client.clone()
    }
}

#[async_trait]
impl AuthenticationProvider for LdapAuthProvider {
    async fn authenticate(
        &self,
        request: &AuthenticationRequest,
    ) -> Result<AuthenticationOutcome, ProviderError> {
        self.client
            .authenticate(&request.principal, &request.credentials)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LdapConfig {
        LdapConfig {
            server_url: "ldap://localhost:389".to_string(),
            bind_dn: "cn=admin,dc=example,dc=com".to_string(),
            bind_password: "admin".to_string(),
            user_base_dn: "ou=users,dc=example,dc=com".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ldap_provider_creation() {
        let provider = LdapAuthProvider::new(config());
        // Note: actual authentication requires running LDAP server
        assert_eq!(provider.client().config().server_url, "ldap://localhost:389");
    }

    #[tokio::test]
    async fn test_empty_password_is_rejected_without_connecting() {
        let provider = LdapAuthProvider::new(config());
        let outcome = provider
            .authenticate(&AuthenticationRequest::new("john", ""))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            AuthenticationOutcome::rejected(RejectReason::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn test_invalid_config_is_a_provider_error() {
        let provider = LdapAuthProvider::new(LdapConfig {
            server_url: "http://localhost".to_string(),
            ..config()
        });
        let err = provider
            .authenticate(&AuthenticationRequest::new("john", "secret"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_reject_reasons() {
        assert_eq!(reject_reason(49), RejectReason::InvalidCredentials);
        assert_eq!(reject_reason(53), RejectReason::AccountDisabled);
        assert_eq!(reject_reason(50), RejectReason::InvalidCredentials);
    }

    #[test]
    fn test_member_of_groups() {
        let client = LdapClient::new(config());
        let mut attrs = std::collections::HashMap::new();
        attrs.insert(
            "memberOf".to_string(),
            vec![
                "CN=Administrators,CN=Builtin,DC=example,DC=com".to_string(),
                "CN=Deployers,OU=Groups,DC=example,DC=com".to_string(),
            ],
        );
        let entry = SearchEntry {
            dn: "CN=john,OU=Users,DC=example,DC=com".to_string(),
            attrs,
            bin_attrs: std::collections::HashMap::new(),
        };

        assert_eq!(
            client.member_of_groups(&entry),
            vec!["Administrators".to_string(), "Deployers".to_string()]
        );
    }
}
