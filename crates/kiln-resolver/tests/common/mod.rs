#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use kiln_core::config::EngineConfig;
use kiln_core::recipe::{ProviderError, Recipe, RecipeProvider};
use kiln_core::reference::PackageReference;
use kiln_core::requirement::{Requirement, RequirementSet};
use kiln_core::version::Version;

/// Recipe provider backed by a map of `name/version` to recipe.
#[derive(Default)]
pub struct MemoryProvider {
    recipes: BTreeMap<String, Recipe>,
    /// Remaining transient failures per package name.
    flaky: RefCell<HashMap<String, u32>>,
    pub recipe_fetches: Cell<usize>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name/version` requiring the given requirement strings.
    pub fn package(self, reference: &str, requires: &[&str]) -> Self {
        self.recipe(reference, recipe(requires))
    }

    pub fn recipe(mut self, reference: &str, recipe: Recipe) -> Self {
        self.recipes.insert(reference.to_string(), recipe);
        self
    }

    /// Make the next `failures` lookups for `name` fail transiently.
    pub fn flaky(self, name: &str, failures: u32) -> Self {
        self.flaky.borrow_mut().insert(name.to_string(), failures);
        self
    }

    fn maybe_fail(&self, name: &str) -> Result<(), ProviderError> {
        let mut flaky = self.flaky.borrow_mut();
        if let Some(left) = flaky.get_mut(name) {
            if *left > 0 {
                *left -= 1;
                return Err(ProviderError::transient(format!("{name}: connection reset")));
            }
        }
        Ok(())
    }
}

impl RecipeProvider for MemoryProvider {
    fn list_versions(&self, name: &str) -> Result<Vec<Version>, ProviderError> {
        self.maybe_fail(name)?;
        let versions: Vec<Version> = self
            .recipes
            .keys()
            .filter_map(|key| key.split_once('/'))
            .filter(|(n, _)| *n == name)
            .map(|(_, v)| Version::parse(v).unwrap())
            .collect();
        if versions.is_empty() {
            Err(ProviderError::not_found(name))
        } else {
            Ok(versions)
        }
    }

    fn get_recipe(&self, reference: &PackageReference) -> Result<Recipe, ProviderError> {
        self.maybe_fail(&reference.name)?;
        self.recipe_fetches.set(self.recipe_fetches.get() + 1);
        self.recipes
            .get(&reference.short())
            .cloned()
            .ok_or_else(|| ProviderError::not_found(reference.short()))
    }
}

pub fn req(text: &str) -> Requirement {
    Requirement::parse(text).unwrap()
}

pub fn recipe(requires: &[&str]) -> Recipe {
    Recipe {
        requires: requires.iter().map(|r| req(r)).collect(),
        ..Recipe::default()
    }
}

/// `app/1.0` requiring the given requirements.
pub fn app(requires: Vec<Requirement>) -> RequirementSet {
    let mut set = RequirementSet::new(PackageReference::parse("app/1.0").unwrap());
    set.requires = requires;
    set
}

/// Engine config with near-instant retries.
pub fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry.backoff_ms = 1;
    config.retry.max_backoff_ms = 2;
    config
}

pub fn map(pairs: &[(&str, &str)]) -> kiln_core::settings::ValueMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// The zlib family used by most scenarios.
pub fn universe() -> MemoryProvider {
    MemoryProvider::new()
        .package("zlib/1.2.11", &[])
        .package("zlib/1.2.13", &[])
        .package("zlib/1.3", &[])
        .package("zlib/1.4-beta", &[])
}
