//! Effective settings and options for each node.
//!
//! Option values are layered, lowest precedence first:
//!
//! 1. the recipe's own defaults
//! 2. values the direct consumer puts on the requirement
//! 3. scoped directives from ancestors (closer to the root wins)
//! 4. scoped directives of the root requirement set
//! 5. the profile (global keys, then `*:` keys, then `pkg:` keys)
//!
//! Settings come from the recipe defaults and the profile only. A recipe
//! that lists the settings it consumes ignores every other profile setting.

use std::collections::BTreeSet;

use kiln_core::recipe::Recipe;
use kiln_core::settings::{scoped_only, unscoped_only, values_for, Profile, ValueMap};
use tracing::debug;

/// The values a node ends up with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effective {
    pub settings: ValueMap,
    pub options: ValueMap,
    /// `settings.<key>` / `options.<key>` whose value is not the recipe default.
    pub overridden_keys: BTreeSet<String>,
}

/// Scoped option directives inherited from ancestors along one path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives(ValueMap);

impl Directives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directives for the children of a node that declares `options`.
    ///
    /// Only scoped keys travel down, and a key an ancestor already set is
    /// never replaced by a deeper declaration.
    pub fn descend(&self, options: &ValueMap) -> Self {
        let mut next = self.0.clone();
        for (key, value) in scoped_only(options) {
            next.entry(key).or_insert(value);
        }
        Self(next)
    }

    /// The inherited values that apply to `package`, scopes stripped.
    pub fn for_package(&self, package: &str) -> ValueMap {
        values_for(&self.0, package)
    }
}

/// Computes effective values under one profile and root requirement set.
pub struct Propagator<'a> {
    profile: &'a Profile,
    root_directives: &'a ValueMap,
}

impl<'a> Propagator<'a> {
    pub fn new(profile: &'a Profile, root_directives: &'a ValueMap) -> Self {
        Self {
            profile,
            root_directives,
        }
    }

    /// Values for the root consumer itself: profile settings and the
    /// unscoped options of the requirement set.
    pub fn root(&self, name: &str) -> Effective {
        Effective {
            settings: values_for(&self.profile.settings, name),
            options: unscoped_only(self.root_directives),
            overridden_keys: BTreeSet::new(),
        }
    }

    /// Values for package `name`, built from `recipe`, reached through a
    /// requirement carrying `edge_options` with `inherited` directives.
    pub fn compute(
        &self,
        name: &str,
        recipe: &Recipe,
        inherited: &Directives,
        edge_options: &ValueMap,
    ) -> Effective {
        let mut settings = recipe.default_settings.clone();
        for (key, value) in values_for(&self.profile.settings, name) {
            let consumed = match &recipe.settings {
                None => true,
                Some(declared) => declared.contains(&key) || settings.contains_key(&key),
            };
            if consumed {
                settings.insert(key, value);
            }
        }

        let defaults = unscoped_only(&recipe.default_options);
        let mut options = defaults.clone();
        let layers = [
            unscoped_only(edge_options),
            inherited.for_package(name),
            values_for(self.root_directives, name),
            values_for(&self.profile.options, name),
        ];
        for layer in layers {
            for (key, value) in layer {
                if let Some(slot) = options.get_mut(&key) {
                    *slot = value;
                } else {
                    debug!("{name}: ignoring value for undeclared option `{key}`");
                }
            }
        }

        let mut overridden_keys = BTreeSet::new();
        for (key, value) in &settings {
            if recipe.default_settings.get(key) != Some(value) {
                overridden_keys.insert(format!("settings.{key}"));
            }
        }
        for (key, value) in &options {
            if defaults.get(key) != Some(value) {
                overridden_keys.insert(format!("options.{key}"));
            }
        }

        Effective {
            settings,
            options,
            overridden_keys,
        }
    }
}
