//! Operation: resolve all dependencies and regenerate Kiln.lock.

use std::path::Path;

use kiln_resolver::lock;
use kiln_util::progress::status;

use crate::project::{Project, ProjectPaths};

/// Force re-resolve all dependencies and regenerate `Kiln.lock`.
pub fn lock(project_root: &Path, paths: &ProjectPaths, verbose: bool) -> miette::Result<()> {
    let project = Project::load(project_root, paths)?;

    // Fresh resolution: the old lockfile is what we are replacing.
    let result = project.resolve(None)?;

    if !result.report.is_empty() && verbose {
        eprintln!("{}", result.report);
    }

    let lockfile = lock::write(&result.graph)?;
    lockfile.write_to(&project.lockfile_path())?;

    status("Locked", &format!("{} packages", result.graph.len()));
    Ok(())
}
