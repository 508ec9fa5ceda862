use std::fmt;

use serde::{Deserialize, Serialize};

/// Binary identity ("package ID") of a resolved node.
///
/// A lowercase hex SHA-256 digest. Two nodes with the same identity are
/// binary-interchangeable, so the identity keys prebuilt binaries in caches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinaryIdentity(String);

impl BinaryIdentity {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for display.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for BinaryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
