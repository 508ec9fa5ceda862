//! Directory-backed binary cache: `<cache>/<name>/<package_id>/`.

use std::fs;
use std::path::{Path, PathBuf};

use kiln_core::identity::BinaryIdentity;
use kiln_core::recipe::{BinaryCache, ProviderError};
use kiln_core::reference::PackageReference;

#[derive(Debug, Clone)]
pub struct LocalBinaryCache {
    root: PathBuf,
}

impl LocalBinaryCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the binary for `name` with `identity`.
    pub fn binary_dir(&self, name: &str, identity: &BinaryIdentity) -> PathBuf {
        self.root.join(name).join(identity.as_str())
    }
}

impl BinaryCache for LocalBinaryCache {
    fn has(
        &self,
        reference: &PackageReference,
        identity: &BinaryIdentity,
    ) -> Result<bool, ProviderError> {
        let dir = self.binary_dir(&reference.name, identity);
        match fs::metadata(&dir) {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ProviderError::transient(format!("{}: {e}", dir.display()))),
        }
    }
}
