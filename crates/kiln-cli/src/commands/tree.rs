//! Handler for `kiln tree`.

use miette::Result;

use kiln_ops::ops_tree::{self, TreeOptions};
use kiln_ops::ProjectPaths;

pub fn exec(
    paths: &ProjectPaths,
    depth: Option<u32>,
    why: Option<String>,
    invert: Option<String>,
    conflicts: bool,
) -> Result<()> {
    let project_root = super::project_root()?;

    let opts = TreeOptions {
        depth: depth.map(|d| d as usize),
        why,
        invert,
        conflicts,
    };

    ops_tree::tree(&project_root, paths, &opts)
}
