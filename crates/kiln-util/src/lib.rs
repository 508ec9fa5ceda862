//! Shared utilities for the Kiln package manager.
//!
//! This crate provides cross-cutting concerns used by all other Kiln crates:
//! error types, filesystem helpers, fingerprint hashing, and terminal
//! status output.

pub mod errors;
pub mod fs;
pub mod hash;
pub mod progress;
