//! The declarative recipe record and the provider/cache seams.
//!
//! Any recipe-specific computation happens on the provider side; the
//! resolver only ever sees a plain [`Recipe`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ParseError;
use crate::identity::BinaryIdentity;
use crate::reference::PackageReference;
use crate::requirement::{Requirement, RequirementEntry};
use crate::settings::{deserialize_value_map, ValueMap};
use crate::version::Version;

/// How a package's dependencies contribute to its binary identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageIdMode {
    /// `name/version` plus the dependency's own binary identity.
    #[default]
    FullPackage,
    /// `name/version` only.
    FullVersion,
    /// `name/MAJOR.Y.Z`: any release of the same major line is compatible.
    Semver,
    /// Dependencies do not affect the identity.
    Unrelated,
}

/// What a recipe provider knows about one package revision.
#[derive(Debug, Clone, Default)]
pub struct Recipe {
    /// Revision of the recipe that was looked up, if the provider tracks them.
    pub revision: Option<String>,
    /// Profile settings this package consumes. `None` adopts every setting.
    pub settings: Option<Vec<String>>,
    pub default_settings: ValueMap,
    /// Unscoped keys declare this package's options; `dep:key` entries are
    /// option directives for packages in its subtree.
    pub default_options: ValueMap,
    /// Settings/option keys that never change the produced binary.
    pub binary_insensitive_keys: BTreeSet<String>,
    pub package_id_mode: PackageIdMode,
    pub requires: Vec<Requirement>,
}

/// On-disk form of a [`Recipe`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeManifest {
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub settings: Option<Vec<String>>,
    #[serde(
        default,
        rename = "default-settings",
        deserialize_with = "deserialize_value_map"
    )]
    pub default_settings: ValueMap,
    #[serde(
        default,
        rename = "default-options",
        deserialize_with = "deserialize_value_map"
    )]
    pub default_options: ValueMap,
    #[serde(default, rename = "binary-insensitive")]
    pub binary_insensitive: BTreeSet<String>,
    #[serde(default, rename = "package-id-mode")]
    pub package_id_mode: PackageIdMode,
    #[serde(default)]
    pub requires: Vec<RequirementEntry>,
}

impl RecipeManifest {
    pub fn into_recipe(self) -> Result<Recipe, ParseError> {
        let requires = self
            .requires
            .iter()
            .map(RequirementEntry::to_requirement)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Recipe {
            revision: self.revision,
            settings: self.settings,
            default_settings: self.default_settings,
            default_options: self.default_options,
            binary_insensitive_keys: self.binary_insensitive,
            package_id_mode: self.package_id_mode,
            requires,
        })
    }
}

/// Failure of a provider or cache lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The thing does not exist; retrying will not help.
    #[error("{what} not found")]
    NotFound { what: String },

    /// Temporary failure (I/O hiccup, unreachable remote); worth retrying.
    #[error("{message}")]
    Transient { message: String },
}

impl ProviderError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Source of recipes: the resolver's only window onto the package universe.
pub trait RecipeProvider {
    /// Every known version of `name`, in any order.
    fn list_versions(&self, name: &str) -> Result<Vec<Version>, ProviderError>;

    /// The recipe for one concrete reference.
    fn get_recipe(&self, reference: &PackageReference) -> Result<Recipe, ProviderError>;

    /// Turn a mutable alias such as `latest` into a concrete version.
    ///
    /// The default understands `latest` (highest non-pre-release version).
    fn resolve_alias(&self, name: &str, alias: &str) -> Result<Version, ProviderError> {
        if alias != "latest" {
            return Err(ProviderError::not_found(format!("alias ({alias}) for {name}")));
        }
        self.list_versions(name)?
            .into_iter()
            .filter(|v| !v.is_prerelease())
            .max()
            .ok_or_else(|| ProviderError::not_found(format!("any release of {name}")))
    }
}

/// Store of prebuilt binaries, keyed by binary identity.
pub trait BinaryCache {
    /// Whether a binary for `reference` with `identity` is available.
    /// Absence is `Ok(false)`, never an error.
    fn has(
        &self,
        reference: &PackageReference,
        identity: &BinaryIdentity,
    ) -> Result<bool, ProviderError>;
}
