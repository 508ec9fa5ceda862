use miette::Diagnostic;
use thiserror::Error;

/// Failure to parse one of the textual forms used across Kiln.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid version `{input}`: {reason}")]
    InvalidVersion { input: String, reason: String },

    #[error("invalid version range `{input}`: {reason}")]
    #[diagnostic(help("Ranges look like `[>=1.0 <2.0]`, `[~1.2]`, `[^1.2]` or `[*]`"))]
    InvalidRange { input: String, reason: String },

    #[error("invalid package reference `{input}`: {reason}")]
    #[diagnostic(help("References look like `name/version[@user/channel][#revision]`"))]
    InvalidReference { input: String, reason: String },
}
