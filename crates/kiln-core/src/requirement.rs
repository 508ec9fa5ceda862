use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::reference::{split_reference, PackageReference};
use crate::settings::{deserialize_value_map, ValueMap};
use crate::version::VersionExpr;

/// A declared need for a package.
///
/// Written as `name/expression[@user/channel][#revision]`, where the
/// expression is an exact version, a `[range]` or an `(alias)`.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub name: String,
    pub version: VersionExpr,
    pub user: Option<String>,
    pub channel: Option<String>,
    pub revision: Option<String>,
    /// Force this version over deeper requests in the declaring node's subtree.
    pub is_override: bool,
    /// Needed to build the consumer only; not part of its runtime closure.
    pub build: bool,
    /// Not exposed to the consumer's own consumers.
    pub private: bool,
    /// Allow this package to exist once per version instead of once per name.
    pub coexist: bool,
    /// Option values the declaring package sets on the required package.
    pub options: ValueMap,
}

impl Requirement {
    pub fn new(name: impl Into<String>, version: VersionExpr) -> Self {
        Self {
            name: name.into(),
            version,
            user: None,
            channel: None,
            revision: None,
            is_override: false,
            build: false,
            private: false,
            coexist: false,
            options: ValueMap::new(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let parts = split_reference(input)?;
        let version = VersionExpr::parse(parts.version)?;
        let mut req = Self::new(parts.name, version);
        req.user = parts.user.map(str::to_string);
        req.channel = parts.channel.map(str::to_string);
        req.revision = parts.revision.map(str::to_string);
        Ok(req)
    }

    /// Requirement pinning exactly `reference` (version, user/channel, revision).
    pub fn exact(reference: &PackageReference) -> Self {
        let mut req = Self::new(
            reference.name.clone(),
            VersionExpr::Exact(reference.version.clone()),
        );
        req.user = reference.user.clone();
        req.channel = reference.channel.clone();
        req.revision = reference.revision.clone();
        req
    }

    pub fn with_override(mut self) -> Self {
        self.is_override = true;
        self
    }

    pub fn build_only(mut self) -> Self {
        self.build = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn coexisting(mut self) -> Self {
        self.coexist = true;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Whether `reference` fulfils this requirement: same name, matching
    /// version, same user/channel, and same revision if one is requested.
    pub fn satisfied_by(&self, reference: &PackageReference) -> bool {
        self.name == reference.name
            && self.version.matches(&reference.version)
            && self.user == reference.user
            && self.channel == reference.channel
            && self
                .revision
                .as_ref()
                .map_or(true, |rev| reference.revision.as_ref() == Some(rev))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;
        if self.user.is_some() || self.channel.is_some() {
            write!(
                f,
                "@{}/{}",
                self.user.as_deref().unwrap_or("_"),
                self.channel.as_deref().unwrap_or("_")
            )?;
        }
        if let Some(rev) = &self.revision {
            write!(f, "#{rev}")?;
        }
        Ok(())
    }
}

/// The root's declared direct requirements plus its option directives for
/// the whole graph (`"zlib:shared" = "True"`, `"*:fPIC" = "True"`).
#[derive(Debug, Clone)]
pub struct RequirementSet {
    pub root: PackageReference,
    pub requires: Vec<Requirement>,
    pub options: ValueMap,
}

impl RequirementSet {
    pub fn new(root: PackageReference) -> Self {
        Self {
            root,
            requires: Vec::new(),
            options: ValueMap::new(),
        }
    }

    pub fn require(mut self, requirement: Requirement) -> Self {
        self.requires.push(requirement);
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// A requirement as written in `Kiln.toml` or a recipe file.
///
/// Supports both shorthand (`"zlib/[>=1.2]"`) and detailed forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequirementEntry {
    Short(String),
    Detailed(DetailedRequirement),
}

/// A requirement with explicit flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedRequirement {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, rename = "override")]
    pub is_override: bool,
    #[serde(default)]
    pub build: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub coexist: bool,
    #[serde(default, deserialize_with = "deserialize_value_map")]
    pub options: ValueMap,
}

impl RequirementEntry {
    pub fn to_requirement(&self) -> Result<Requirement, ParseError> {
        match self {
            RequirementEntry::Short(s) => Requirement::parse(s),
            RequirementEntry::Detailed(d) => {
                let mut req = Requirement::parse(&d.reference)?;
                req.is_override = d.is_override;
                req.build = d.build;
                req.private = d.private;
                req.coexist = d.coexist;
                req.options = d.options.clone();
                Ok(req)
            }
        }
    }
}
