use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for Kiln front-end operations.
///
/// Resolution itself reports the richer `kiln_resolver::ResolveError`; this
/// type covers everything around it (reading manifests, profiles, lockfiles
/// and configuration from disk).
#[derive(Debug, Error, Diagnostic)]
pub enum KilnError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed manifest, profile or recipe file.
    #[error("Manifest error: {message}")]
    #[diagnostic(help("Check your Kiln.toml and recipe files for syntax errors"))]
    Manifest { message: String },

    /// Dependency resolution failed (conflicts, cycles, stale locks, etc.).
    #[error("Dependency resolution failed: {message}")]
    Resolution { message: String },

    /// Lockfile could not be read, parsed or written.
    #[error("Lockfile error: {message}")]
    #[diagnostic(help("Delete Kiln.lock and run `kiln lock` to regenerate it"))]
    Lockfile { message: String },

    /// Engine configuration is invalid.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type KilnResult<T> = miette::Result<T>;
