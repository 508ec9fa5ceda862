use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A temporary `KILN_HOME` holding an index, plus a project directory.
pub struct Sandbox {
    pub tmp: TempDir,
}

impl Sandbox {
    /// Index with zlib 1.2.13 / 1.3 and libpng 1.6.40; the project requires
    /// libpng and asks for a shared zlib.
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let sandbox = Self { tmp };
        sandbox.recipe("zlib", "1.2.13", "default-options = { shared = false }\n");
        sandbox.recipe("zlib", "1.3", "default-options = { shared = false }\n");
        sandbox.recipe("libpng", "1.6.40", "requires = [\"zlib/[>=1.2 <2]\"]\n");
        write(
            &sandbox.project().join("Kiln.toml"),
            r#"
requires = ["libpng/[>=1.6]"]

[package]
name = "app"
version = "1.0"

[options]
"zlib:shared" = true
"#,
        );
        sandbox
    }

    pub fn home(&self) -> PathBuf {
        self.tmp.path().join("home")
    }

    pub fn project(&self) -> PathBuf {
        self.tmp.path().join("project")
    }

    pub fn recipe(&self, name: &str, version: &str, content: &str) {
        write(
            &self.home().join("index").join(name).join(format!("{version}.toml")),
            content,
        );
    }

    pub fn kiln(&self) -> Command {
        let mut cmd = Command::cargo_bin("kiln").unwrap();
        cmd.current_dir(self.project())
            .env("KILN_HOME", self.home())
            .env_remove("KILN_PROFILE")
            .env_remove("KILN_INDEX")
            .env_remove("KILN_CACHE")
            .env_remove("RUST_LOG");
        cmd
    }
}
