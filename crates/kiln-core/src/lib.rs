//! Core data types for the Kiln package manager.
//!
//! This crate defines the vocabulary shared by the resolver and the front
//! end: version ordering and range matching, package references,
//! requirements, settings/options maps and profiles, the declarative recipe
//! record returned by a recipe provider, binary identities, the lockfile
//! model, engine configuration and the project manifest.
//!
//! This crate is intentionally free of network I/O.

pub mod config;
pub mod error;
pub mod identity;
pub mod lockfile;
pub mod manifest;
pub mod recipe;
pub mod reference;
pub mod requirement;
pub mod settings;
pub mod version;
