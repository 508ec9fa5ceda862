//! Operation: display the dependency tree.

use std::path::Path;

use kiln_resolver::ResolutionResult;

use crate::project::{Project, ProjectPaths};

/// Options for `kiln tree`.
#[derive(Debug, Default)]
pub struct TreeOptions {
    /// Maximum tree depth to display.
    pub depth: Option<usize>,
    /// Show the path from the root to this package.
    pub why: Option<String>,
    /// Show what depends on this package.
    pub invert: Option<String>,
    /// Show overrides and other version adjustments.
    pub conflicts: bool,
}

/// Display the dependency tree for the project.
pub fn tree(project_root: &Path, paths: &ProjectPaths, opts: &TreeOptions) -> miette::Result<()> {
    let project = Project::load(project_root, paths)?;
    let lockfile = project.read_lockfile()?;
    let result = project.resolve(lockfile.as_ref())?;
    print!("{}", render(&result, opts));
    Ok(())
}

/// The text `kiln tree` prints for `opts`.
pub fn render(result: &ResolutionResult, opts: &TreeOptions) -> String {
    if let Some(target) = &opts.why {
        return match result.graph.find_path(target) {
            Some(path) => {
                let mut out = format!("Path to {target}:\n");
                for (i, node) in path.iter().enumerate() {
                    out.push_str(&format!("{}{node}\n", "  ".repeat(i)));
                }
                out
            }
            None => format!("Package '{target}' not found in the graph.\n"),
        };
    }

    if opts.conflicts {
        return format!("{}\n", result.report);
    }

    if let Some(target) = &opts.invert {
        let inverted = result.graph.print_inverted_tree(target);
        if inverted.is_empty() {
            return format!("Package '{target}' not found in the graph.\n");
        }
        return inverted;
    }

    result.graph.print_tree(opts.depth)
}
