//! Deploy versions and the store names derived from them.
//!
//! Every persistent store is named `{purpose}-{version}`, e.g.
//! `static-v1-20251002` or `data-v1-20251002`. The version is the suffix
//! after the first `-`, so versions may themselves contain dashes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Opaque deploy tag chosen at build time. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(String);

impl Version {
    pub fn parse(tag: &str) -> Result<Self, StoreError> {
        let valid = !tag.is_empty()
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if valid {
            Ok(Self(tag.to_string()))
        } else {
            Err(StoreError::InvalidName(format!("bad version tag {:?}", tag)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Version {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Application shell and same-origin assets
    Static,
    /// Third-party data feeds
    Dynamic,
}

impl Purpose {
    pub const ALL: [Purpose; 2] = [Purpose::Static, Purpose::Dynamic];

    pub fn prefix(&self) -> &'static str {
        match self {
            Purpose::Static => "static",
            Purpose::Dynamic => "data",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.prefix() == prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreName {
    pub purpose: Purpose,
    pub version: Version,
}

impl StoreName {
    pub fn new(purpose: Purpose, version: Version) -> Self {
        Self { purpose, version }
    }

    pub fn belongs_to(&self, version: &Version) -> bool {
        &self.version == version
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.purpose.prefix(), self.version)
    }
}

impl FromStr for StoreName {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, tag) = s
            .split_once('-')
            .ok_or_else(|| StoreError::InvalidName(s.to_string()))?;
        let purpose =
            Purpose::from_prefix(prefix).ok_or_else(|| StoreError::InvalidName(s.to_string()))?;
        Ok(Self::new(purpose, Version::parse(tag)?))
    }
}
