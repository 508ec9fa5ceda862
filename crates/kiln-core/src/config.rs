use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use kiln_util::errors::KilnError;
use tracing::debug;

/// Engine configuration loaded from `~/.kiln/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub build: BuildConfig,
}

/// Conflict handling from `[resolver]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Settle non-override version conflicts by keeping the higher version
    /// instead of failing.
    #[serde(default, rename = "take-highest")]
    pub take_highest: bool,

    #[serde(default, rename = "override-policy")]
    pub override_policy: OverridePolicy,
}

/// Whether an override may move a package to a different major line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverridePolicy {
    /// Overrides always win.
    #[default]
    Force,
    /// Overrides crossing a major version are reported as conflicts.
    SameMajor,
}

/// Retry behaviour for recipe and binary-cache lookups from `[retry]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_backoff_ms", rename = "backoff-ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms", rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

/// When the planner schedules builds, from `[build]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub policy: BuildPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildPolicy {
    /// Build only what the binary cache lacks.
    #[default]
    Missing,
    /// Never build; uncached packages are reported as missing.
    Never,
    /// Build everything, even packages present in the cache.
    Always,
}

impl std::str::FromStr for BuildPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missing" => Ok(Self::Missing),
            "never" => Ok(Self::Never),
            "always" => Ok(Self::Always),
            other => Err(format!(
                "unknown build policy `{other}` (expected missing, never or always)"
            )),
        }
    }
}

impl EngineConfig {
    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            KilnError::Config {
                message: format!("Failed to parse config: {e}"),
            }
            .into()
        })
    }

    /// Load the configuration from `path`, or return defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> miette::Result<Self> {
        if path.is_file() {
            let content = kiln_util::fs::read_text(path, "config")?;
            Self::parse_toml(&content)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load `config.toml` from the Kiln data directory.
    pub fn load() -> miette::Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Returns the default path to the global config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }
}

/// Returns the Kiln data directory: `$KILN_HOME`, else `~/.kiln/`.
pub fn dirs_path() -> PathBuf {
    if let Ok(home) = std::env::var("KILN_HOME") {
        return PathBuf::from(home);
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".kiln")
}
