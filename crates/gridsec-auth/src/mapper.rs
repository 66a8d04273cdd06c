//! Group to authority mapping
//!
//! Maps the groups a directory reports for a principal (Active Directory
//! `memberOf` entries, LDAP group CNs) to grid authorities. The table is an
//! allow-list: groups without an entry grant nothing.

use gridsec_core::types::{Authority, AuthorityFactory};
use gridsec_core::{AuthorityParseError, AUTHORITY_MAP_DELIM};
use std::collections::HashMap;
use thiserror::Error;

/// Group name to comma-separated authority rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMapper {
    group_map: HashMap<String, String>,
}

/// A mapping entry whose rules do not parse
#[derive(Error, Debug)]
#[error("Invalid authority rule for group [{group}]: {source}")]
pub struct InvalidGroupMapping {
    pub group: String,
    #[source]
    pub source: AuthorityParseError,
}

impl GroupMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: impl Into<String>, rules: impl Into<String>) -> Option<String> {
        self.group_map.insert(group.into(), rules.into())
    }

    pub fn with(mut self, group: impl Into<String>, rules: impl Into<String>) -> Self {
        self.insert(group, rules);
        self
    }

    pub fn get(&self, group: &str) -> Option<&str> {
        self.group_map.get(group).map(|s| s.as_str())
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.group_map.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.group_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group_map.is_empty()
    }

    /// Map reported groups to authorities, see [`map_groups_to_authorities`]
    pub fn map<I, S>(
        &self,
        groups: I,
        factory: &dyn AuthorityFactory,
    ) -> Result<Vec<Authority>, AuthorityParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        map_groups_to_authorities(groups, self, factory)
    }

    /// Parse every rule of every group once, reporting the first bad one
    pub fn validate(&self, factory: &dyn AuthorityFactory) -> Result<(), InvalidGroupMapping> {
        for (group, rules) in &self.group_map {
            for rule in split_rules(rules) {
                factory.create(rule).map_err(|source| InvalidGroupMapping {
                    group: group.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for GroupMapper {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            group_map: iter.into_iter().collect(),
        }
    }
}

impl From<HashMap<String, String>> for GroupMapper {
    fn from(group_map: HashMap<String, String>) -> Self {
        Self { group_map }
    }
}

fn split_rules(rules: &str) -> impl Iterator<Item = &str> {
    rules
        .split(AUTHORITY_MAP_DELIM)
        .map(str::trim)
        .filter(|rule| !rule.is_empty())
}

/// Translate reported groups into authorities.
///
/// Each group is trimmed and looked up in `mapper`; unknown groups are
/// skipped. The rules of a matching group are parsed left to right and
/// appended, so authorities accumulate across groups without
/// de-duplication.
pub fn map_groups_to_authorities<I, S>(
    groups: I,
    mapper: &GroupMapper,
    factory: &dyn AuthorityFactory,
) -> Result<Vec<Authority>, AuthorityParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut authorities = Vec::new();

    for group in groups {
        let member_of = group.as_ref().trim();
        if let Some(rules) = mapper.get(member_of) {
            for rule in split_rules(rules) {
                authorities.push(factory.create(rule)?);
            }
        }
    }

    Ok(authorities)
}
