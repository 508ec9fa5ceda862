use serde::{Deserialize, Serialize};
use std::path::Path;

use kiln_util::errors::KilnError;

use crate::reference::PackageReference;
use crate::requirement::{RequirementEntry, RequirementSet};
use crate::settings::{deserialize_value_map, ValueMap};
use crate::version::Version;

/// The parsed representation of a `Kiln.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub package: PackageMetadata,

    #[serde(default)]
    pub requires: Vec<RequirementEntry>,

    /// Option directives for the dependency graph (`"zlib:shared" = true`).
    #[serde(default, deserialize_with = "deserialize_value_map")]
    pub options: ValueMap,
}

/// Package identity from the `[package]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Manifest {
    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            KilnError::Manifest {
                message: format!("Failed to parse Kiln.toml: {e}"),
            }
            .into()
        })
    }

    /// Load and parse a `Kiln.toml` file from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = kiln_util::fs::read_text(path, "manifest")?;
        Self::parse_toml(&content)
    }

    /// The root reference and its direct requirements.
    pub fn requirement_set(&self) -> miette::Result<RequirementSet> {
        let manifest_err = |message: String| KilnError::Manifest { message };

        let version = Version::parse(&self.package.version)
            .map_err(|e| manifest_err(format!("[package] version: {e}")))?;
        let root = PackageReference::new(self.package.name.clone(), version);

        let mut set = RequirementSet::new(root);
        for entry in &self.requires {
            let req = entry
                .to_requirement()
                .map_err(|e| manifest_err(format!("requires: {e}")))?;
            set.requires.push(req);
        }
        set.options = self.options.clone();
        Ok(set)
    }
}
