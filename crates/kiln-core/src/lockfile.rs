use serde::{Deserialize, Serialize};
use std::path::Path;

use kiln_util::errors::KilnError;

use crate::settings::ValueMap;

/// Format version written by this release.
pub const LOCKFILE_VERSION: u32 = 1;

/// Deterministic snapshot of a resolved graph (`Kiln.lock`).
///
/// `node[0]` is the root; dependencies refer to other nodes by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub version: u32,
    #[serde(default, rename = "node", skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<LockedNode>,
}

/// A single locked package with its effective configuration and identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedNode {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "package-id")]
    pub package_id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub coexist: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub overridden: bool,
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub settings: ValueMap,
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub options: ValueMap,
    #[serde(default, rename = "deps", skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<LockedDependency>,
}

/// An edge to another locked node, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDependency {
    pub index: usize,
    #[serde(default, skip_serializing_if = "is_false")]
    pub build: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub private: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Lockfile {
    pub fn new() -> Self {
        Self {
            version: LOCKFILE_VERSION,
            nodes: Vec::new(),
        }
    }

    /// Parse lockfile text and check its format version.
    pub fn parse(content: &str) -> miette::Result<Self> {
        let lockfile: Lockfile = toml::from_str(content).map_err(|e| KilnError::Lockfile {
            message: format!("Failed to parse lockfile: {e}"),
        })?;
        if lockfile.version != LOCKFILE_VERSION {
            return Err(KilnError::Lockfile {
                message: format!(
                    "unsupported lockfile version {} (expected {LOCKFILE_VERSION})",
                    lockfile.version
                ),
            }
            .into());
        }
        Ok(lockfile)
    }

    /// Load and parse a `Kiln.lock` file from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = kiln_util::fs::read_text(path, "lockfile")?;
        Self::parse(&content)
    }

    /// Serialize the lockfile to a pretty-printed TOML string.
    pub fn to_string_pretty(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Write the lockfile to `path`.
    pub fn write_to(&self, path: &Path) -> miette::Result<()> {
        let text = self.to_string_pretty().map_err(|e| KilnError::Lockfile {
            message: format!("Failed to serialize lockfile: {e}"),
        })?;
        kiln_util::fs::write_text(path, &text)?;
        Ok(())
    }
}

impl Default for Lockfile {
    fn default() -> Self {
        Self::new()
    }
}
