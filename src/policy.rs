//! External-access policy
//!
//! Models which external resources the schema compiler and the validator may
//! resolve while processing. An [`AccessList`] follows the familiar
//! `accessExternalDTD` / `accessExternalSchema` convention: an empty list means
//! no external resolution at all, the keyword `all` lifts the restriction, and
//! anything else is a set of permitted protocols (`file`, `http`, ...).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keyword that permits every protocol
pub const ALL_KEYWORD: &str = "all";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Invalid protocol name in access list: '{0}'")]
    InvalidProtocol(String),
}

/// Allow-list of protocols for one kind of external resource
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub enum AccessList {
    /// No external resolution
    #[default]
    None,
    /// Any protocol may be resolved
    All,
    /// Only the listed protocols (lowercase) may be resolved
    Protocols(BTreeSet<String>),
}

impl AccessList {
    /// Build a list from individual entries, each of which may itself be
    /// comma-separated.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut protocols = BTreeSet::new();
        for entry in entries {
            for item in entry.as_ref().split(',') {
                let item = item.trim().to_ascii_lowercase();
                if item.is_empty() {
                    continue;
                }
                if item == ALL_KEYWORD {
                    return Ok(AccessList::All);
                }
                if !is_protocol_name(&item) {
                    return Err(PolicyError::InvalidProtocol(item));
                }
                protocols.insert(item);
            }
        }

        if protocols.is_empty() {
            Ok(AccessList::None)
        } else {
            Ok(AccessList::Protocols(protocols))
        }
    }

    /// Whether a resource at `url` may be resolved under this list
    pub fn permits(&self, url: &str) -> bool {
        match self {
            AccessList::None => false,
            AccessList::All => true,
            AccessList::Protocols(protocols) => protocols.contains(&protocol_of(url)),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AccessList::None)
    }
}

impl FromStr for AccessList {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessList::from_entries([s])
    }
}

impl TryFrom<Vec<String>> for AccessList {
    type Error = PolicyError;

    fn try_from(entries: Vec<String>) -> Result<Self, Self::Error> {
        AccessList::from_entries(entries)
    }
}

impl From<AccessList> for Vec<String> {
    fn from(list: AccessList) -> Self {
        match list {
            AccessList::None => Vec::new(),
            AccessList::All => vec![ALL_KEYWORD.to_string()],
            AccessList::Protocols(protocols) => protocols.into_iter().collect(),
        }
    }
}

impl fmt::Display for AccessList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessList::None => write!(f, "none"),
            AccessList::All => write!(f, "{}", ALL_KEYWORD),
            AccessList::Protocols(protocols) => {
                let joined: Vec<&str> = protocols.iter().map(String::as_str).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

/// RFC 3986 scheme characters
fn is_protocol_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Protocol of a resource location. Bare paths (including Windows drive
/// paths such as `C:\schemas\a.xsd`) count as `file`.
pub fn protocol_of(url: &str) -> String {
    match url.split_once(':') {
        Some((scheme, _)) if scheme.len() > 1 && is_protocol_name(scheme) => {
            scheme.to_ascii_lowercase()
        }
        _ => "file".to_string(),
    }
}

/// Kind of external resource being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessProperty {
    /// External DTD subsets and external entities
    ExternalDtd,
    /// Schemas pulled in through `xs:include`, `xs:import`, `xs:redefine`
    /// or `xsi:schemaLocation` hints
    ExternalSchema,
}

impl AccessProperty {
    pub const ALL: [AccessProperty; 2] = [AccessProperty::ExternalDtd, AccessProperty::ExternalSchema];
}

impl fmt::Display for AccessProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessProperty::ExternalDtd => write!(f, "external DTD access"),
            AccessProperty::ExternalSchema => write!(f, "external schema access"),
        }
    }
}

/// Processing stage a restriction applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Schema compilation
    Compiler,
    /// Instance validation
    Validator,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Compiler => write!(f, "schema compiler"),
            Stage::Validator => write!(f, "validator"),
        }
    }
}

/// Access lists for both kinds of external resource
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExternalAccess {
    #[serde(default)]
    pub external_dtd: AccessList,
    #[serde(default)]
    pub external_schema: AccessList,
}

impl ExternalAccess {
    /// Policy that resolves nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// Policy that resolves everything
    pub fn unrestricted() -> Self {
        Self {
            external_dtd: AccessList::All,
            external_schema: AccessList::All,
        }
    }

    pub fn list(&self, property: AccessProperty) -> &AccessList {
        match property {
            AccessProperty::ExternalDtd => &self.external_dtd,
            AccessProperty::ExternalSchema => &self.external_schema,
        }
    }

    pub fn set(&mut self, property: AccessProperty, list: AccessList) {
        match property {
            AccessProperty::ExternalDtd => self.external_dtd = list,
            AccessProperty::ExternalSchema => self.external_schema = list,
        }
    }

    pub fn permits(&self, property: AccessProperty, url: &str) -> bool {
        self.list(property).permits(url)
    }
}

/// Hardening requested for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Strictest built-in processing mode of the backend
    pub secure_processing: bool,
    /// External resources each stage may resolve
    #[serde(flatten)]
    pub access: ExternalAccess,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            secure_processing: true,
            access: ExternalAccess::none(),
        }
    }
}
