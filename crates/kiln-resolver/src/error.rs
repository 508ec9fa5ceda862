//! Resolution error taxonomy.

use miette::Diagnostic;
use thiserror::Error;

/// Why a provider or cache lookup ultimately failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    NotFound,
    TransientExhausted { attempts: u32 },
}

/// A terminal resolution failure. No partial graph accompanies it.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    /// Two requirements for one package disagree and neither overrides.
    #[error(
        "version conflict for `{name}`: {existing} (via {}) vs {requested} (via {}): {reason}",
        .existing_path.join(" -> "),
        .requested_path.join(" -> ")
    )]
    #[diagnostic(
        code(kiln::resolve::conflict),
        help("Add an `override = true` requirement at the root, or set `take-highest = true` under [resolver]")
    )]
    Conflict {
        name: String,
        existing: String,
        requested: String,
        existing_path: Vec<String>,
        requested_path: Vec<String>,
        reason: String,
    },

    /// Expansion or planning found a dependency cycle.
    #[error("dependency cycle: {}", .path.join(" -> "))]
    #[diagnostic(code(kiln::resolve::cycle))]
    Cycle { path: Vec<String> },

    /// No known version satisfies the requested range.
    #[error(
        "no version of `{name}` matches {expression} (available: {}), required via {}",
        if .available.is_empty() { "none".to_string() } else { .available.join(", ") },
        .path.join(" -> ")
    )]
    #[diagnostic(code(kiln::resolve::unresolvable))]
    UnresolvableRange {
        name: String,
        expression: String,
        available: Vec<String>,
        path: Vec<String>,
    },

    /// A pinned lockfile entry no longer satisfies a live requirement.
    #[error(
        "lockfile pins {locked} but {requested} is required via {}",
        .path.join(" -> ")
    )]
    #[diagnostic(
        code(kiln::resolve::stale_lock),
        help("Run `kiln lock` to re-resolve and rewrite Kiln.lock")
    )]
    StaleLock {
        name: String,
        locked: String,
        requested: String,
        path: Vec<String>,
    },

    /// A recipe provider or binary cache lookup failed for good.
    #[error("could not fetch {what}: {message}")]
    #[diagnostic(code(kiln::resolve::fetch))]
    ProviderFetch {
        what: String,
        kind: FetchFailure,
        message: String,
    },

    /// A lockfile is internally inconsistent or a graph cannot be locked.
    #[error("invalid lockfile: {message}")]
    #[diagnostic(code(kiln::resolve::lockfile))]
    Lockfile { message: String },
}
