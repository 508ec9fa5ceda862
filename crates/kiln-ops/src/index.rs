//! Directory-backed recipe provider.
//!
//! Layout: `<index>/<name>/<version>.toml`, each file a recipe manifest.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use kiln_core::recipe::{ProviderError, Recipe, RecipeManifest, RecipeProvider};
use kiln_core::reference::PackageReference;
use kiln_core::version::Version;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct LocalIndex {
    root: PathBuf,
}

impl LocalIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory of this index.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the recipe file for `name/version`.
    pub fn recipe_path(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(format!("{version}.toml"))
    }
}

impl RecipeProvider for LocalIndex {
    fn list_versions(&self, name: &str) -> Result<Vec<Version>, ProviderError> {
        let dir = self.root.join(name);
        let entries = fs::read_dir(&dir).map_err(|e| io_error(e, name))?;

        let mut versions = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(e, name))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match Version::parse(stem) {
                Ok(version) => versions.push(version),
                Err(e) => warn!("Ignoring {}: {e}", path.display()),
            }
        }
        debug!("{name}: {} versions in {}", versions.len(), dir.display());
        if versions.is_empty() {
            return Err(ProviderError::not_found(format!("package {name}")));
        }
        Ok(versions)
    }

    fn get_recipe(&self, reference: &PackageReference) -> Result<Recipe, ProviderError> {
        let path = self.recipe_path(&reference.name, reference.version.as_str());
        let content = fs::read_to_string(&path).map_err(|e| io_error(e, &reference.short()))?;
        let manifest: RecipeManifest = toml::from_str(&content).map_err(|e| {
            ProviderError::not_found(format!("valid recipe at {} ({e})", path.display()))
        })?;
        let recipe = manifest.into_recipe().map_err(|e| {
            ProviderError::not_found(format!("valid recipe at {} ({e})", path.display()))
        })?;

        if let (Some(wanted), Some(found)) = (&reference.revision, &recipe.revision) {
            if wanted != found {
                return Err(ProviderError::not_found(format!(
                    "{reference} (index has revision {found})"
                )));
            }
        }
        Ok(recipe)
    }
}

/// Missing files are permanent; anything else may clear up on retry.
fn io_error(e: std::io::Error, what: &str) -> ProviderError {
    match e.kind() {
        ErrorKind::NotFound => ProviderError::not_found(what),
        _ => ProviderError::transient(format!("{what}: {e}")),
    }
}
