//! Handler for `kiln lock`.

use miette::Result;

use kiln_ops::ProjectPaths;

pub fn exec(paths: &ProjectPaths, verbose: bool) -> Result<()> {
    let project_root = super::project_root()?;
    kiln_ops::ops_lock::lock(&project_root, paths, verbose)
}
