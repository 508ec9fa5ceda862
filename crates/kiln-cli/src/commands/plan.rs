//! Handler for `kiln plan`.

use miette::Result;

use kiln_core::config::BuildPolicy;
use kiln_ops::ops_plan::{self, PlanOptions};
use kiln_ops::ProjectPaths;

pub fn exec(paths: &ProjectPaths, json: bool, policy: Option<BuildPolicy>) -> Result<()> {
    let project_root = super::project_root()?;
    let opts = PlanOptions { json, policy };
    ops_plan::plan(&project_root, paths, &opts)
}
