//! Command dispatch and handler modules.

mod lock;
mod plan;
mod tree;

use std::path::PathBuf;

use miette::Result;

use kiln_ops::ProjectPaths;
use kiln_util::errors::KilnError;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    let paths = ProjectPaths {
        home: None,
        profile: cli.profile,
        index: cli.index,
        cache: cli.cache,
    };
    match cli.command {
        Command::Lock => lock::exec(&paths, cli.verbose),
        Command::Plan { json, build } => plan::exec(&paths, json, build),
        Command::Tree {
            depth,
            why,
            invert,
            conflicts,
        } => tree::exec(&paths, depth, why, invert, conflicts),
    }
}

/// The current directory, which must contain a `Kiln.toml`.
fn project_root() -> Result<PathBuf> {
    let project_root = std::env::current_dir().map_err(KilnError::Io)?;

    if !project_root.join("Kiln.toml").is_file() {
        return Err(KilnError::Manifest {
            message: "No Kiln.toml found in current directory".to_string(),
        }
        .into());
    }
    Ok(project_root)
}
