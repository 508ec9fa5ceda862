//! CLI argument definitions for Kiln.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kiln_core::config::BuildPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "Dependency graph resolution for native packages",
    long_about = "Kiln resolves a project's package requirements into a dependency graph, \
                  computes a binary identity for every package and plans which packages \
                  to build or download."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Build profile (TOML with [settings] and [options])
    #[arg(long, global = true, env = "KILN_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Recipe index directory [default: <KILN_HOME>/index]
    #[arg(long, global = true, env = "KILN_INDEX")]
    pub index: Option<PathBuf>,

    /// Binary cache directory [default: <KILN_HOME>/cache]
    #[arg(long, global = true, env = "KILN_CACHE")]
    pub cache: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve all dependencies and regenerate Kiln.lock
    Lock,

    /// Show which packages must be built or downloaded, in order
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
        /// Build policy: missing, never or always
        #[arg(long, value_name = "POLICY")]
        build: Option<BuildPolicy>,
    },

    /// Display the dependency tree
    Tree {
        /// Maximum depth
        #[arg(long)]
        depth: Option<u32>,
        /// Explain why a dependency is included
        #[arg(long)]
        why: Option<String>,
        /// Show what depends on a package
        #[arg(long, value_name = "NAME")]
        invert: Option<String>,
        /// Show overrides and other version adjustments
        #[arg(long)]
        conflicts: bool,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
