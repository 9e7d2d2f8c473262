//! # Type Definition Identifiers
//!
//! Typed objects are tagged with `Module.Type`, optionally followed by a
//! version: `Module.Type-2` or `Module.Type-2.1`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// A validated `Module.Type[-major[.minor]]` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeDefId {
    module: String,
    name: String,
    major: Option<u32>,
    minor: Option<u32>,
}

impl TypeDefId {
    /// An unversioned identifier.
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Result<Self, RegistryError> {
        let module = module.into();
        let name = name.into();
        if !is_identifier(&module) || !is_identifier(&name) {
            return Err(RegistryError::InvalidTypeDefId(format!("{module}.{name}")));
        }
        Ok(Self {
            module,
            name,
            major: None,
            minor: None,
        })
    }

    /// Attach a version.
    pub fn with_version(mut self, major: u32, minor: Option<u32>) -> Self {
        self.major = Some(major);
        self.minor = minor;
        self
    }

    /// The module name.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The type name within the module.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Major version, if given.
    pub fn major(&self) -> Option<u32> {
        self.major
    }

    /// Minor version, if given.
    pub fn minor(&self) -> Option<u32> {
        self.minor
    }

    /// `Module.Type` without any version.
    pub fn type_string(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for TypeDefId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RegistryError::InvalidTypeDefId(s.to_string());
        let (type_part, version) = match s.split_once('-') {
            Some((t, v)) => (t, Some(v)),
            None => (s, None),
        };
        let (module, name) = type_part.split_once('.').ok_or_else(invalid)?;
        let id = Self::new(module, name).map_err(|_| invalid())?;
        let Some(version) = version else {
            return Ok(id);
        };
        let (major, minor) = match version.split_once('.') {
            Some((major, minor)) => (major, Some(minor)),
            None => (version, None),
        };
        let major = major.parse::<u32>().map_err(|_| invalid())?;
        let minor = minor
            .map(|m| m.parse::<u32>().map_err(|_| invalid()))
            .transpose()?;
        Ok(id.with_version(major, minor))
    }
}

impl fmt::Display for TypeDefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)?;
        if let Some(major) = self.major {
            write!(f, "-{major}")?;
            if let Some(minor) = self.minor {
                write!(f, ".{minor}")?;
            }
        }
        Ok(())
    }
}
