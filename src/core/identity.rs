//! Catalog identifiers derived from the directory hierarchy
//!
//! Projects are identified by their dot-delimited path from the content
//! root (`gizmo.drive`), parts by a prefixed dot-delimited part number
//! (`ACME.gizmo.drive.motor`). Both are computed during collection, before
//! any cross-reference resolution, since descriptors reference parts by
//! these exact strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Dot-delimited project identifier, e.g. `gizmo.drive`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId(String);

impl ProjectId {
    /// Id of a top-level project directory.
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Id of a subdirectory of `self`.
    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}.{}", self.0, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate a serialized project id.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        validate_dotted(s)?;
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Globally unique part number: `PREFIX.<project-path>.<local-name>`.
///
/// Case is preserved as authored; [`PartNumber::key`] yields the uppercased
/// form under which the part is registered and looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartNumber(String);

impl PartNumber {
    /// Compute the part number for a descriptor named `local` inside the
    /// project `parent` (or at the content root when `parent` is `None`).
    pub fn new(prefix: &str, parent: Option<&ProjectId>, local: &str) -> Self {
        match parent {
            Some(parent) => Self(format!("{}.{}.{}", prefix, parent.as_str(), local)),
            None => Self(format!("{}.{}", prefix, local)),
        }
    }

    /// Uppercased index key; part lookups are case-insensitive.
    pub fn key(&self) -> String {
        self.0.to_uppercase()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate a serialized part number.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        validate_dotted(s)?;
        if !s.contains('.') {
            return Err(IdError::MissingPrefix(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for PartNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PartNumber {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate_dotted(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }
    if s.split('.').any(|segment| segment.is_empty()) {
        return Err(IdError::EmptySegment(s.to_string()));
    }
    Ok(())
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(ProjectId);
string_serde!(PartNumber);

/// Errors that can occur when parsing catalog identifiers
#[derive(Debug, Error)]
pub enum IdError {
    #[error("empty identifier")]
    Empty,

    #[error("empty dot-delimited segment in identifier: '{0}'")]
    EmptySegment(String),

    #[error("part number has no prefix segment: '{0}'")]
    MissingPrefix(String),
}
