//! Settings/options maps, package-scoped keys, and the build profile.
//!
//! Keys in a profile or in option directives may be scoped to a package:
//! `compiler=gcc` and `*:shared=True` apply to every package, while
//! `zlib:shared=False` applies to `zlib` only and wins over the global keys.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use kiln_util::errors::KilnError;

/// String-to-string map with sorted keys.
pub type ValueMap = BTreeMap<String, String>;

/// Split `pkg:key` into `(Some("pkg"), "key")`; an unscoped key yields `None`.
pub fn split_scoped(key: &str) -> (Option<&str>, &str) {
    match key.split_once(':') {
        Some((scope, rest)) => (Some(scope), rest),
        None => (None, key),
    }
}

/// The values from `map` that apply to `package`, with scopes stripped.
///
/// Unscoped keys are applied first, then `*:` keys, then `package:` keys, so
/// a package-specific value always wins.
pub fn values_for(map: &ValueMap, package: &str) -> ValueMap {
    let mut out = ValueMap::new();
    for pass in 0..3 {
        for (key, value) in map {
            let applies = match (pass, split_scoped(key)) {
                (0, (None, _)) => true,
                (1, (Some("*"), _)) => true,
                (2, (Some(scope), _)) => scope == package,
                _ => false,
            };
            if applies {
                out.insert(split_scoped(key).1.to_string(), value.clone());
            }
        }
    }
    out
}

/// Only the keys explicitly scoped to another package (`pkg:key` or `*:key`),
/// i.e. directives meant for dependencies rather than the declaring package.
pub fn scoped_only(map: &ValueMap) -> ValueMap {
    map.iter()
        .filter(|(k, _)| split_scoped(k).0.is_some())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Keys without a scope.
pub fn unscoped_only(map: &ValueMap) -> ValueMap {
    map.iter()
        .filter(|(k, _)| split_scoped(k).0.is_none())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Build profile: the global settings and options a resolution runs under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, deserialize_with = "deserialize_value_map")]
    pub settings: ValueMap,

    #[serde(default, deserialize_with = "deserialize_value_map")]
    pub options: ValueMap,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            KilnError::Manifest {
                message: format!("Failed to parse profile: {e}"),
            }
            .into()
        })
    }

    /// Load a profile TOML file (`[settings]`, `[options]`).
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = kiln_util::fs::read_text(path, "profile")?;
        Self::parse_toml(&content)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

/// Accept `key = "x"`, `key = true` or `key = 3` and store the text form.
pub fn deserialize_value_map<'de, D>(deserializer: D) -> Result<ValueMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Scalar>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| {
            let text = match v {
                Scalar::Str(s) => s,
                Scalar::Bool(b) => if b { "True" } else { "False" }.to_string(),
                Scalar::Int(i) => i.to_string(),
                Scalar::Float(f) => f.to_string(),
            };
            (k, text)
        })
        .collect())
}
