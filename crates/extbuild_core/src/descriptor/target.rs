//! Native extension target declaration.

use super::{ConfigResult, ConfigurationError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static MODULE_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid module path regex")
});

/// One compiled module the host runtime imports like a regular module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionTarget {
    /// Importable dotted module path, e.g. `rust_ext.rust_ext`.
    pub module: String,
    /// External build manifest describing how to compile the module.
    pub manifest: PathBuf,
    /// Toolchain feature flags enabled for this target.
    pub features: Vec<String>,
    /// Extra toolchain arguments appended verbatim.
    pub args: Vec<String>,
}

impl ExtensionTarget {
    pub fn new(module: impl Into<String>, manifest: impl Into<PathBuf>) -> Self {
        Self {
            module: module.into(),
            manifest: manifest.into(),
            features: Vec::new(),
            args: Vec::new(),
        }
    }

    /// Validates declaration-level target invariants.
    pub fn validate(&self) -> ConfigResult<()> {
        if !is_module_path(&self.module) {
            return Err(ConfigurationError::InvalidModulePath(self.module.clone()));
        }
        if self.manifest.as_os_str().is_empty() {
            return Err(ConfigurationError::EmptyManifestPath(self.module.clone()));
        }
        Ok(())
    }

    /// Module path relative to the project root, without file suffix.
    ///
    /// `rust_ext.rust_ext` maps to `rust_ext/rust_ext`.
    pub fn relative_module_path(&self) -> PathBuf {
        self.module.split('.').collect()
    }

    /// Final installed location of the compiled module under `root`.
    pub fn module_file(&self, root: &Path, suffix: &str) -> PathBuf {
        root.join(self.relative_module_path()).with_extension(suffix)
    }
}

/// Returns true for dotted identifier paths (`pkg.sub.module`).
pub fn is_module_path(value: &str) -> bool {
    MODULE_PATH_RE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::{is_module_path, ExtensionTarget};
    use crate::descriptor::ConfigurationError;
    use std::path::{Path, PathBuf};

    #[test]
    fn accepts_dotted_module_paths() {
        assert!(is_module_path("rust_ext"));
        assert!(is_module_path("rust_ext.rust_ext"));
        assert!(is_module_path("_private.sub_2.leaf"));
    }

    #[test]
    fn rejects_malformed_module_paths() {
        for value in ["", ".rust_ext", "rust_ext.", "rust..ext", "2fast", "rust-ext", "a b"] {
            assert!(!is_module_path(value), "`{value}` must be rejected");
        }
    }

    #[test]
    fn validate_rejects_empty_manifest() {
        let target = ExtensionTarget::new("rust_ext.rust_ext", "");
        assert_eq!(
            target.validate().unwrap_err(),
            ConfigurationError::EmptyManifestPath("rust_ext.rust_ext".to_string())
        );
    }

    #[test]
    fn maps_module_path_to_installed_file() {
        let target = ExtensionTarget::new("rust_ext.rust_ext", "Cargo.toml");
        assert_eq!(
            target.relative_module_path(),
            PathBuf::from("rust_ext").join("rust_ext")
        );
        assert_eq!(
            target.module_file(Path::new("/project"), "so"),
            Path::new("/project/rust_ext/rust_ext.so")
        );
    }
}
