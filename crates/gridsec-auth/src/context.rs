//! Security context
//!
//! Holds the named authentication providers and group mappers a security
//! manager resolves on `init`. A context is either built in code or loaded
//! from a document by a [`ContextLoader`].
//!
//! Example document (TOML):
//! ```toml
//! [[authentication_provider]]
//! name = "directory"
//!
//! [authentication_provider.ldap]
//! server_url = "ldaps://dc.corp.example.com:636"
//! domain = "corp.example.com"
//!
//! [[group_mapper]]
//! name = "groupMapper"
//!
//! [[group_mapper.group]]
//! name = "Administrators"
//! authorities = "GridPrivilege MANAGE_GRID,GridPrivilege MANAGE_PU"
//! ```

use gridsec_core::{Result, SecurityError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::ldap::{LdapAuthProvider, LdapConfig};
use crate::mapper::GroupMapper;
use crate::provider::AuthenticationProvider;
use crate::static_provider::{StaticAuthProvider, StaticProviderConfig};

/// Name preferred when a context holds several group mappers
pub const DEFAULT_GROUP_MAPPER_NAME: &str = "groupMapper";

// ============================================================================
// Context
// ============================================================================

/// Named registrations of providers and group mappers
pub struct SecurityContext {
    location: String,
    providers: Vec<(String, Arc<dyn AuthenticationProvider>)>,
    group_mappers: Vec<(String, Arc<GroupMapper>)>,
}

impl SecurityContext {
    /// Create an empty context; `location` is only used in messages
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            providers: Vec::new(),
            group_mappers: Vec::new(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn register_provider(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn AuthenticationProvider>,
    ) -> Result<()> {
        let name = name.into();
        if self.provider(&name).is_some() {
            return Err(SecurityError::Configuration(format!(
                "Authentication provider '{}' is defined more than once in {}",
                name, self.location
            )));
        }
        self.providers.push((name, provider));
        Ok(())
    }

    pub fn register_group_mapper(
        &mut self,
        name: impl Into<String>,
        mapper: GroupMapper,
    ) -> Result<()> {
        let name = name.into();
        if self.group_mapper(&name).is_some() {
            return Err(SecurityError::Configuration(format!(
                "Group mapper '{}' is defined more than once in {}",
                name, self.location
            )));
        }
        self.group_mappers.push((name, Arc::new(mapper)));
        Ok(())
    }

    pub fn provider(&self, name: &str) -> Option<Arc<dyn AuthenticationProvider>> {
        self.providers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.clone())
    }

    pub fn group_mapper(&self, name: &str) -> Option<Arc<GroupMapper>> {
        self.group_mappers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m.clone())
    }

    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|(n, _)| n.as_str())
    }

    pub fn group_mapper_names(&self) -> impl Iterator<Item = &str> {
        self.group_mappers.iter().map(|(n, _)| n.as_str())
    }

    /// The single authentication provider of this context
    pub fn resolve_provider(&self) -> Result<Arc<dyn AuthenticationProvider>> {
        match self.providers.as_slice() {
            [] => Err(SecurityError::Configuration(format!(
                "No authentication provider is defined in {}",
                self.location
            ))),
            [(name, provider)] => {
                debug!("Resolved authentication provider '{}'", name);
                Ok(provider.clone())
            }
            _ => Err(SecurityError::Configuration(format!(
                "More than one authentication provider is defined in {}: {}",
                self.location,
                self.provider_names().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// The group mapper of this context.
    ///
    /// With several mappers, the one named [`DEFAULT_GROUP_MAPPER_NAME`] wins.
    pub fn resolve_group_mapper(&self) -> Result<Arc<GroupMapper>> {
        match self.group_mappers.as_slice() {
            [] => Err(SecurityError::Configuration(format!(
                "No group mapper is defined in {}",
                self.location
            ))),
            [(name, mapper)] => {
                debug!("Resolved group mapper '{}' ({} groups)", name, mapper.len());
                Ok(mapper.clone())
            }
            _ => self.group_mapper(DEFAULT_GROUP_MAPPER_NAME).ok_or_else(|| {
                SecurityError::Configuration(format!(
                    "More than one group mapper is defined in {} and none is named '{}'",
                    self.location, DEFAULT_GROUP_MAPPER_NAME
                ))
            }),
        }
    }

    /// Shut down every registered provider
    pub fn shutdown(&self) {
        for (name, provider) in &self.providers {
            debug!("Shutting down authentication provider '{}'", name);
            provider.shutdown();
        }
    }
}

// ============================================================================
// Document
// ============================================================================

/// Serialized form of a security context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextDocument {
    #[serde(default, rename = "authentication_provider")]
    pub providers: Vec<ProviderDefinition>,

    #[serde(default, rename = "group_mapper")]
    pub group_mappers: Vec<GroupMapperDefinition>,
}

/// One provider; exactly one of the kind sections must be present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldap: Option<LdapConfig>,

    #[serde(default, rename = "static", skip_serializing_if = "Option::is_none")]
    pub static_users: Option<StaticProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMapperDefinition {
    pub name: String,

    #[serde(default, rename = "group")]
    pub groups: Vec<GroupMapping>,
}

/// Group name and its comma-separated authority rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMapping {
    pub name: String,
    pub authorities: String,
}

/// Syntax of a context document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFormat {
    Toml,
    Json,
    Xml,
}

impl ContextFormat {
    /// Pick the format from the file extension; XML unless `.toml`/`.json`
    pub fn from_location(location: &str) -> Self {
        let extension = Path::new(location)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("toml") => ContextFormat::Toml,
            Some("json") => ContextFormat::Json,
            _ => ContextFormat::Xml,
        }
    }
}

impl ContextDocument {
    pub fn parse(content: &str, format: ContextFormat) -> Result<Self> {
        let parsed = match format {
            ContextFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ContextFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            ContextFormat::Xml => quick_xml::de::from_str(content).map_err(|e| e.to_string()),
        };

        parsed.map_err(|e| {
            SecurityError::Configuration(format!("Failed to parse security config: {}", e))
        })
    }

    /// Instantiate the providers and mappers of this document
    pub fn into_context(self, location: &str) -> Result<SecurityContext> {
        self.register_into(SecurityContext::new(location))
    }

    /// Register this document's definitions into `context`. On error every
    /// provider already in the context is shut down.
    fn register_into(self, mut context: SecurityContext) -> Result<SecurityContext> {
        match self.register_definitions(&mut context) {
            Ok(()) => Ok(context),
            Err(e) => {
                context.shutdown();
                Err(e)
            }
        }
    }

    fn register_definitions(self, context: &mut SecurityContext) -> Result<()> {
        for definition in self.providers {
            let provider: Arc<dyn AuthenticationProvider> =
                match (definition.ldap, definition.static_users) {
                    (Some(ldap), None) => {
                        ldap.validate().map_err(|e| {
                            SecurityError::Configuration(format!(
                                "Invalid LDAP settings for provider '{}': {}",
                                definition.name, e
                            ))
                        })?;
                        Arc::new(LdapAuthProvider::new(ldap))
                    }
                    (None, Some(users)) => Arc::new(StaticAuthProvider::from_config(&users)),
                    _ => {
                        return Err(SecurityError::Configuration(format!(
                            "Authentication provider '{}' must define exactly one of 'ldap' or 'static'",
                            definition.name
                        )));
                    }
                };
            context.register_provider(definition.name, provider)?;
        }

        for definition in self.group_mappers {
            let mut group_map = HashMap::new();
            for mapping in definition.groups {
                let group = mapping.name.trim().to_string();
                if group_map.insert(group.clone(), mapping.authorities).is_some() {
                    return Err(SecurityError::Configuration(format!(
                        "Group '{}' is mapped more than once in group mapper '{}'",
                        group, definition.name
                    )));
                }
            }
            context.register_group_mapper(definition.name, GroupMapper::from(group_map))?;
        }

        Ok(())
    }
}

// ============================================================================
// Loaders
// ============================================================================

/// Resolves a configuration location into a security context
pub trait ContextLoader: Send + Sync {
    fn load(&self, location: &str) -> Result<SecurityContext>;
}

/// Loads context documents from the file system
#[derive(Debug, Clone, Copy, Default)]
pub struct FileContextLoader;

impl ContextLoader for FileContextLoader {
    fn load(&self, location: &str) -> Result<SecurityContext> {
        let content = std::fs::read_to_string(location).map_err(|e| {
            SecurityError::Configuration(format!(
                "Failed to read security config {}: {}",
                location, e
            ))
        })?;

        let format = ContextFormat::from_location(location);
        debug!("Loading security context from {} as {:?}", location, format);

        ContextDocument::parse(&content, format)?.into_context(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AuthenticationOutcome, AuthenticationRequest, ProviderError, RejectReason};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOML_DOCUMENT: &str = r#"
[[authentication_provider]]
name = "users"

[[authentication_provider.static.user]]
username = "alice"
password = "wonderland"
group = ["Administrators"]

[[group_mapper]]
name = "groupMapper"

[[group_mapper.group]]
name = "Administrators"
authorities = "GridPrivilege MANAGE_GRID,GridPrivilege MANAGE_PU"

[[group_mapper.group]]
name = "Deployers"
authorities = "MANAGE_PU"
"#;

    fn static_provider() -> Arc<dyn AuthenticationProvider> {
        Arc::new(StaticAuthProvider::new([]))
    }

    #[test]
    fn test_format_from_location() {
        assert_eq!(ContextFormat::from_location("security-config.xml"), ContextFormat::Xml);
        assert_eq!(ContextFormat::from_location("conf/security.TOML"), ContextFormat::Toml);
        assert_eq!(ContextFormat::from_location("security.json"), ContextFormat::Json);
        assert_eq!(ContextFormat::from_location("security"), ContextFormat::Xml);
    }

    #[tokio::test]
    async fn test_parse_toml_document() {
        let context = ContextDocument::parse(TOML_DOCUMENT, ContextFormat::Toml)
            .unwrap()
            .into_context("inline.toml")
            .unwrap();

        let mapper = context.resolve_group_mapper().unwrap();
        assert_eq!(mapper.get("Deployers"), Some("MANAGE_PU"));
        assert_eq!(mapper.len(), 2);

        let provider = context.resolve_provider().unwrap();
        let outcome = provider
            .authenticate(&AuthenticationRequest::new("alice", "wonderland"))
            .await
            .unwrap();
        assert!(outcome.is_authenticated());
    }

    #[test]
    fn test_parse_json_document() {
        let json = r#"{
            "authentication_provider": [
                { "name": "directory",
                  "ldap": { "server_url": "ldaps://dc.corp.example.com:636", "domain": "corp.example.com" } }
            ],
            "group_mapper": [
                { "name": "groupMapper", "group": [ { "name": "Deployers", "authorities": "MANAGE_PU" } ] }
            ]
        }"#;

        let context = ContextDocument::parse(json, ContextFormat::Json)
            .unwrap()
            .into_context("inline.json")
            .unwrap();
        assert_eq!(context.provider_names().collect::<Vec<_>>(), vec!["directory"]);
        assert!(context.resolve_provider().is_ok());
    }

    #[tokio::test]
    async fn test_parse_xml_document() {
        let xml = r#"<security-config>
  <authentication_provider>
    <name>users</name>
    <static>
      <user>
        <username>alice</username>
        <password>wonderland</password>
        <group>Deployers</group>
      </user>
    </static>
  </authentication_provider>
  <group_mapper>
    <name>groupMapper</name>
    <group>
      <name>Deployers</name>
      <authorities>MANAGE_PU</authorities>
    </group>
  </group_mapper>
</security-config>"#;

        let context = ContextDocument::parse(xml, ContextFormat::Xml)
            .unwrap()
            .into_context("inline.xml")
            .unwrap();

        assert_eq!(
            context.resolve_group_mapper().unwrap().get("Deployers"),
            Some("MANAGE_PU")
        );
        let outcome = context
            .resolve_provider()
            .unwrap()
            .authenticate(&AuthenticationRequest::new("alice", "wonderland"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AuthenticationOutcome::authenticated("alice", vec!["Deployers".to_string()])
        );
    }

    #[test]
    fn test_provider_must_have_one_kind() {
        let toml = r#"
[[authentication_provider]]
name = "empty"
"#;
        let err = ContextDocument::parse(toml, ContextFormat::Toml)
            .unwrap()
            .into_context("inline.toml")
            .err()
            .unwrap();
        assert_eq!(err.code(), "ConfigurationError");
    }

    #[test]
    fn test_invalid_ldap_settings_are_rejected() {
        let toml = r#"
[[authentication_provider]]
name = "directory"

[authentication_provider.ldap]
server_url = "http://not-ldap"
"#;
        let err = ContextDocument::parse(toml, ContextFormat::Toml)
            .unwrap()
            .into_context("inline.toml")
            .err()
            .unwrap();
        assert!(err.to_string().contains("directory"));
    }

    #[test]
    fn test_duplicate_group_is_rejected() {
        let toml = r#"
[[group_mapper]]
name = "groupMapper"

[[group_mapper.group]]
name = "Ops"
authorities = "MONITOR_PU"

[[group_mapper.group]]
name = " Ops "
authorities = "MONITOR_JVM"
"#;
        assert!(ContextDocument::parse(toml, ContextFormat::Toml)
            .unwrap()
            .into_context("inline.toml")
            .is_err());
    }

    #[test]
    fn test_failed_document_shuts_down_registered_providers() {
        struct Recording(AtomicUsize);

        #[async_trait]
        impl AuthenticationProvider for Recording {
            async fn authenticate(
                &self,
                _request: &AuthenticationRequest,
            ) -> std::result::Result<AuthenticationOutcome, ProviderError> {
                Ok(AuthenticationOutcome::rejected(RejectReason::NotAuthenticated))
            }

            fn shutdown(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let existing = Arc::new(Recording(AtomicUsize::new(0)));
        let mut context = SecurityContext::new("inline.toml");
        context.register_provider("existing", existing.clone()).unwrap();

        let toml = r#"
[[group_mapper]]
name = "groupMapper"

[[group_mapper.group]]
name = "Ops"
authorities = "MONITOR_PU"

[[group_mapper.group]]
name = "Ops"
authorities = "MONITOR_JVM"
"#;
        let result = ContextDocument::parse(toml, ContextFormat::Toml)
            .unwrap()
            .register_into(context);

        assert!(result.is_err());
        assert_eq!(existing.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolve_provider_requires_exactly_one() {
        let mut context = SecurityContext::new("test");
        assert!(matches!(
            context.resolve_provider(),
            Err(SecurityError::Configuration(_))
        ));

        context.register_provider("first", static_provider()).unwrap();
        assert!(context.resolve_provider().is_ok());

        context.register_provider("second", static_provider()).unwrap();
        let err = context.resolve_provider().err().unwrap();
        assert!(err.to_string().contains("More than one"));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut context = SecurityContext::new("test");
        context.register_provider("users", static_provider()).unwrap();
        assert!(context.register_provider("users", static_provider()).is_err());

        context.register_group_mapper("groupMapper", GroupMapper::new()).unwrap();
        assert!(context
            .register_group_mapper("groupMapper", GroupMapper::new())
            .is_err());
    }

    #[test]
    fn test_resolve_group_mapper() {
        let mut context = SecurityContext::new("test");
        assert!(context.resolve_group_mapper().is_err());

        context
            .register_group_mapper("other", GroupMapper::new().with("Ops", "MONITOR_PU"))
            .unwrap();
        assert_eq!(
            context.resolve_group_mapper().unwrap().get("Ops"),
            Some("MONITOR_PU")
        );

        context
            .register_group_mapper("third", GroupMapper::new())
            .unwrap();
        assert!(context.resolve_group_mapper().is_err());

        context
            .register_group_mapper(
                DEFAULT_GROUP_MAPPER_NAME,
                GroupMapper::new().with("Deployers", "MANAGE_PU"),
            )
            .unwrap();
        assert_eq!(
            context.resolve_group_mapper().unwrap().get("Deployers"),
            Some("MANAGE_PU")
        );
    }

    #[test]
    fn test_file_loader() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(TOML_DOCUMENT.as_bytes()).unwrap();

        let location = file.path().to_str().unwrap().to_string();
        let context = FileContextLoader.load(&location).unwrap();

        assert_eq!(context.location(), location);
        assert_eq!(context.provider_names().collect::<Vec<_>>(), vec!["users"]);
        assert_eq!(
            context.group_mapper_names().collect::<Vec<_>>(),
            vec!["groupMapper"]
        );
    }

    #[test]
    fn test_file_loader_missing_file() {
        let err = FileContextLoader
            .load("/nonexistent/gridsec/security-config.xml")
            .err()
            .unwrap();
        assert_eq!(err.code(), "ConfigurationError");
    }
}
