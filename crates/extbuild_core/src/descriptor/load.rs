//! Descriptor file loading.
//!
//! # Responsibility
//! - Read `extbuild.toml` and map it onto `PackageDescriptor`.
//! - Resolve manifest and test paths against the descriptor's directory.
//! - Discover packages when the file does not list them.
//!
//! # Invariants
//! - Unknown keys are rejected instead of silently ignored.
//! - Returned descriptors have passed `PackageDescriptor::validate()`.

use super::discovery::{discover_packages, DEFAULT_PACKAGE_MARKER};
use super::package::{PackageDescriptor, TestSuite};
use super::target::ExtensionTarget;
use super::{ConfigResult, ConfigurationError};
use log::{error, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Descriptor file name looked up in the working directory.
pub const DEFAULT_DESCRIPTOR_FILE: &str = "extbuild.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDescriptor {
    package: RawPackage,
    #[serde(default, rename = "extension")]
    extensions: Vec<RawExtension>,
    #[serde(default)]
    test: Option<RawTest>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawPackage {
    name: String,
    version: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    install_requires: Vec<String>,
    #[serde(default)]
    setup_requires: Vec<String>,
    #[serde(default)]
    tests_require: Vec<String>,
    packages: Option<Vec<String>>,
    #[serde(default)]
    package_marker: Option<String>,
    #[serde(default)]
    zip_safe: bool,
    module_suffix: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawExtension {
    module: String,
    manifest: PathBuf,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTest {
    runner: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    dir: Option<PathBuf>,
}

/// Loads and validates the descriptor at `path`.
///
/// The directory containing `path` becomes the project root.
///
/// # Errors
/// - `ConfigurationError::Read` when the file or its directory is unreadable.
/// - `ConfigurationError::Parse` for TOML syntax, missing or unknown keys.
/// - Any validation error from `PackageDescriptor::validate()`.
pub fn load_descriptor(path: impl AsRef<Path>) -> ConfigResult<PackageDescriptor> {
    let path = path.as_ref();
    info!(
        "event=descriptor_load module=descriptor status=start path={}",
        path.display()
    );

    let result = read_descriptor(path);
    match &result {
        Ok(descriptor) => info!(
            "event=descriptor_load module=descriptor status=ok package={} version={} extensions={} packages={}",
            descriptor.name,
            descriptor.version,
            descriptor.extensions.len(),
            descriptor.packages.len()
        ),
        Err(err) => error!(
            "event=descriptor_load module=descriptor status=error path={} error={}",
            path.display(),
            err
        ),
    }
    result
}

fn read_descriptor(path: &Path) -> ConfigResult<PackageDescriptor> {
    let read_error = |err: std::io::Error| ConfigurationError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    };

    let source = std::fs::read_to_string(path).map_err(read_error)?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let root = parent.canonicalize().map_err(read_error)?;

    parse_descriptor(&source, &root).map_err(|err| match err {
        ConfigurationError::Parse { message, .. } => ConfigurationError::Parse {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })
}

/// Parses descriptor text with `root` as the project root.
pub fn parse_descriptor(source: &str, root: &Path) -> ConfigResult<PackageDescriptor> {
    let raw: RawDescriptor = toml::from_str(source).map_err(|err| ConfigurationError::Parse {
        path: root.join(DEFAULT_DESCRIPTOR_FILE),
        message: err.message().to_string(),
    })?;

    let test = match raw.test {
        Some(test) => {
            let defaults = TestSuite::default();
            TestSuite {
                runner: test.runner.unwrap_or(defaults.runner),
                args: test.args,
                dir: root.join(test.dir.unwrap_or(defaults.dir)),
            }
        }
        None => {
            let mut defaults = TestSuite::default();
            defaults.dir = root.join(defaults.dir);
            defaults
        }
    };

    let packages = match raw.package.packages {
        Some(packages) => packages,
        None => {
            let marker = raw
                .package
                .package_marker
                .as_deref()
                .unwrap_or(DEFAULT_PACKAGE_MARKER);
            discover_packages(root, marker, std::slice::from_ref(&test.dir))?
        }
    };

    let mut descriptor = PackageDescriptor::new(root, raw.package.name, raw.package.version);
    descriptor.description = raw.package.description;
    descriptor.install_requires = raw.package.install_requires;
    descriptor.setup_requires = raw.package.setup_requires;
    descriptor.tests_require = raw.package.tests_require;
    descriptor.packages = packages;
    descriptor.zip_safe = raw.package.zip_safe;
    if let Some(suffix) = raw.package.module_suffix {
        descriptor.module_suffix = suffix;
    }
    descriptor.extensions = raw
        .extensions
        .into_iter()
        .map(|extension| ExtensionTarget {
            module: extension.module,
            manifest: resolve_manifest(root, extension.manifest),
            features: extension.features,
            args: extension.args,
        })
        .collect();
    descriptor.test = test;

    descriptor.validate()?;
    Ok(descriptor)
}

// An empty manifest stays empty so validation can report it.
fn resolve_manifest(root: &Path, manifest: PathBuf) -> PathBuf {
    if manifest.as_os_str().is_empty() {
        manifest
    } else {
        root.join(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::{load_descriptor, parse_descriptor};
    use crate::descriptor::{ConfigurationError, DEFAULT_PACKAGE_MARKER};
    use std::fs;
    use std::path::Path;

    const SIMPLE_EXTENSION: &str = r#"
[package]
name = "rust_ext"
version = "0.1.0"
description = "Example of python-extension using rust-numpy"
install-requires = ["numpy"]
setup-requires = ["setuptools-rust>=0.6.0"]
tests-require = ["pytest"]
packages = ["rust_ext"]

[[extension]]
module = "rust_ext.rust_ext"
manifest = "./Cargo.toml"
"#;

    #[test]
    fn parses_simple_extension_descriptor() {
        let root = Path::new("/project");
        let descriptor = parse_descriptor(SIMPLE_EXTENSION, root).unwrap();

        assert_eq!(descriptor.name, "rust_ext");
        assert_eq!(descriptor.version, "0.1.0");
        assert_eq!(descriptor.install_requires, vec!["numpy"]);
        assert_eq!(descriptor.setup_requires, vec!["setuptools-rust>=0.6.0"]);
        assert_eq!(descriptor.packages, vec!["rust_ext"]);
        assert!(!descriptor.zip_safe);
        assert_eq!(descriptor.extensions.len(), 1);
        assert_eq!(descriptor.extensions[0].manifest, root.join("./Cargo.toml"));
        assert_eq!(descriptor.test.runner, "pytest");
        assert_eq!(descriptor.test.dir, root.join("tests"));
    }

    #[test]
    fn applies_test_table_overrides() {
        let source = format!(
            "{SIMPLE_EXTENSION}\n[test]\nrunner = \"python\"\nargs = [\"-m\", \"pytest\", \"-q\"]\ndir = \"suite\"\n"
        );
        let descriptor = parse_descriptor(&source, Path::new("/project")).unwrap();

        assert_eq!(descriptor.test.runner, "python");
        assert_eq!(descriptor.test.args, vec!["-m", "pytest", "-q"]);
        assert_eq!(descriptor.test.dir, Path::new("/project/suite"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let source = SIMPLE_EXTENSION.replace(
            "packages = [\"rust_ext\"]",
            "packages = [\"rust_ext\"]\ncmdclass = \"test\"",
        );
        let err = parse_descriptor(&source, Path::new("/project")).unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse { .. }));
    }

    #[test]
    fn rejects_missing_version() {
        let source = SIMPLE_EXTENSION.replace("version = \"0.1.0\"\n", "");
        let err = parse_descriptor(&source, Path::new("/project")).unwrap_err();
        match err {
            ConfigurationError::Parse { message, .. } => assert!(message.contains("version")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn surfaces_validation_errors() {
        let source = SIMPLE_EXTENSION.replace("0.1.0", "one");
        let err = parse_descriptor(&source, Path::new("/project")).unwrap_err();
        assert_eq!(err, ConfigurationError::InvalidVersion("one".to_string()));
    }

    #[test]
    fn load_resolves_root_and_discovers_packages() {
        let dir = tempfile::tempdir().unwrap();
        let source = SIMPLE_EXTENSION.replace("packages = [\"rust_ext\"]\n", "");
        fs::write(dir.path().join("extbuild.toml"), source).unwrap();
        for package in ["rust_ext", "tests"] {
            fs::create_dir_all(dir.path().join(package)).unwrap();
            fs::write(dir.path().join(package).join(DEFAULT_PACKAGE_MARKER), "").unwrap();
        }

        let descriptor = load_descriptor(dir.path().join("extbuild.toml")).unwrap();
        let root = dir.path().canonicalize().unwrap();

        assert_eq!(descriptor.root, root);
        assert_eq!(descriptor.packages, vec!["rust_ext"]);
        assert_eq!(descriptor.extensions[0].manifest, root.join("./Cargo.toml"));
    }

    #[test]
    fn load_reports_missing_file_as_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_descriptor(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigurationError::Read { .. }));
    }
}
