//! Everything an operation needs from a project directory.

use std::path::{Path, PathBuf};

use kiln_core::config::{dirs_path, EngineConfig};
use kiln_core::lockfile::Lockfile;
use kiln_core::manifest::Manifest;
use kiln_core::requirement::RequirementSet;
use kiln_core::settings::Profile;
use kiln_resolver::ResolutionResult;
use kiln_util::errors::KilnError;
use kiln_util::progress::spinner;
use tracing::debug;

use crate::cache::LocalBinaryCache;
use crate::index::LocalIndex;

pub const MANIFEST_FILE: &str = "Kiln.toml";
pub const LOCKFILE_FILE: &str = "Kiln.lock";

/// Locations that can be overridden from the command line.
#[derive(Debug, Clone, Default)]
pub struct ProjectPaths {
    /// Data directory; defaults to `$KILN_HOME` or `~/.kiln`.
    pub home: Option<PathBuf>,
    pub profile: Option<PathBuf>,
    pub index: Option<PathBuf>,
    pub cache: Option<PathBuf>,
}

/// A loaded project: manifest, profile, engine config, index and cache.
pub struct Project {
    pub root: PathBuf,
    pub manifest: Manifest,
    pub requirements: RequirementSet,
    pub profile: Profile,
    pub config: EngineConfig,
    pub index: LocalIndex,
    pub cache: LocalBinaryCache,
}

impl Project {
    pub fn load(project_root: &Path, paths: &ProjectPaths) -> miette::Result<Self> {
        let manifest_path = project_root.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(KilnError::Manifest {
                message: format!("No {MANIFEST_FILE} found in {}", project_root.display()),
            }
            .into());
        }
        let manifest = Manifest::from_path(&manifest_path)?;
        let requirements = manifest.requirement_set()?;

        let home = paths.home.clone().unwrap_or_else(dirs_path);
        let profile = match &paths.profile {
            Some(path) => Profile::from_path(path)?,
            None => {
                let default = home.join("profiles").join("default.toml");
                if default.is_file() {
                    Profile::from_path(&default)?
                } else {
                    Profile::default()
                }
            }
        };
        let config = EngineConfig::load_from(&home.join("config.toml"))?;
        let index = LocalIndex::new(paths.index.clone().unwrap_or_else(|| home.join("index")));
        let cache =
            LocalBinaryCache::new(paths.cache.clone().unwrap_or_else(|| home.join("cache")));
        debug!(
            "Project {} (index {}, cache {})",
            project_root.display(),
            index.root().display(),
            cache.root().display()
        );

        Ok(Self {
            root: project_root.to_path_buf(),
            manifest,
            requirements,
            profile,
            config,
            index,
            cache,
        })
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.root.join(LOCKFILE_FILE)
    }

    /// The existing `Kiln.lock`, if there is one.
    pub fn read_lockfile(&self) -> miette::Result<Option<Lockfile>> {
        let path = self.lockfile_path();
        if path.is_file() {
            Ok(Some(Lockfile::from_path(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Resolve the project's requirements against the index, pinned by
    /// `lockfile` when given.
    pub fn resolve(&self, lockfile: Option<&Lockfile>) -> miette::Result<ResolutionResult> {
        let sp = spinner("Resolving dependencies...");
        let result = kiln_resolver::resolve(
            &self.requirements,
            &self.profile,
            &self.index,
            lockfile,
            &self.config,
        );
        sp.finish_and_clear();
        Ok(result?)
    }
}
