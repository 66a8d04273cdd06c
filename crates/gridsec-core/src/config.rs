//! Host-supplied properties for the security manager

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::{DEFAULT_CONFIG_LOCATION, SPRING_SECURITY_CONFIG_LOCATION};

/// Flat key/value properties handed over by the host on `init`.
///
/// Typical host configuration:
///
/// ```text
/// spring-security-config-location = ../config/security/security-config.xml
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityProperties {
    #[serde(flatten)]
    properties: HashMap<String, String>,
}

impl SecurityProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load properties from the environment.
    ///
    /// `GRIDSEC_SECURITY_CONFIG_LOCATION` maps to the config location key.
    pub fn from_env() -> Self {
        let mut props = Self::default();

        if let Ok(location) = std::env::var("GRIDSEC_SECURITY_CONFIG_LOCATION") {
            debug!("Using security config location from environment: {}", location);
            props.set(SPRING_SECURITY_CONFIG_LOCATION, location);
        }

        props
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|s| s.as_str())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Location of the security context document
    pub fn config_location(&self) -> &str {
        self.get_or(SPRING_SECURITY_CONFIG_LOCATION, DEFAULT_CONFIG_LOCATION)
    }
}

impl From<HashMap<String, String>> for SecurityProperties {
    fn from(properties: HashMap<String, String>) -> Self {
        Self { properties }
    }
}

impl FromIterator<(String, String)> for SecurityProperties {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_location() {
        let props = SecurityProperties::new();
        assert_eq!(props.config_location(), "security-config.xml");
    }

    #[test]
    fn test_configured_location() {
        let props = SecurityProperties::new()
            .with(SPRING_SECURITY_CONFIG_LOCATION, "../config/security/security-config.toml");
        assert_eq!(
            props.config_location(),
            "../config/security/security-config.toml"
        );
    }

    #[test]
    fn test_from_map() {
        let mut map = HashMap::new();
        map.insert("other".to_string(), "value".to_string());
        let props = SecurityProperties::from(map);

        assert_eq!(props.get("other"), Some("value"));
        assert_eq!(props.config_location(), DEFAULT_CONFIG_LOCATION);
    }
}
