//! Package metadata declaration and validation.

use super::target::{is_module_path, ExtensionTarget};
use super::{ConfigResult, ConfigurationError};
use crate::build::DEFAULT_MODULE_SUFFIX;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Runner spawned by the `test` action when the descriptor names none.
pub const DEFAULT_TEST_RUNNER: &str = "pytest";
/// Test directory handed to the runner when the descriptor names none.
pub const DEFAULT_TEST_DIR: &str = "tests";

pub(crate) const INSTALL_REQUIRES: &str = "install-requires";
pub(crate) const SETUP_REQUIRES: &str = "setup-requires";
pub(crate) const TESTS_REQUIRE: &str = "tests-require";

static PACKAGE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9._-]*[A-Za-z0-9])?$").expect("valid package name regex")
});
// name, optional [extras], optional version specifiers, optional `; marker`.
static REQUIREMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[[A-Za-z0-9._,\s-]*\])?\s*(?:(?:~=|===|==|!=|<=|>=|<|>)\s*[A-Za-z0-9.*+!_-]+(?:\s*,\s*(?:~=|===|==|!=|<=|>=|<|>)\s*[A-Za-z0-9.*+!_-]+)*)?\s*(?:;.+)?$",
    )
    .expect("valid requirement regex")
});
static SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)*$").expect("valid suffix regex"));

/// External test-runner invocation for the `test` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSuite {
    /// Runner executable, looked up on `PATH` unless absolute.
    pub runner: String,
    /// Arguments placed before the test directory.
    pub args: Vec<String>,
    /// Test suite location handed to the runner as its last argument.
    pub dir: PathBuf,
}

impl Default for TestSuite {
    fn default() -> Self {
        Self {
            runner: DEFAULT_TEST_RUNNER.to_string(),
            args: Vec::new(),
            dir: PathBuf::from(DEFAULT_TEST_DIR),
        }
    }
}

/// Static package metadata plus the native extension targets it ships.
///
/// Built once per invocation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// Project root every relative path resolves against.
    pub root: PathBuf,
    pub name: String,
    /// Semantic version string (`major.minor.patch[-pre][+build]`).
    pub version: String,
    pub description: String,
    /// Runtime dependencies, resolved by an external installer.
    pub install_requires: Vec<String>,
    /// Dependencies needed to run the build itself.
    pub setup_requires: Vec<String>,
    /// Extra dependencies needed by the test suite only.
    pub tests_require: Vec<String>,
    /// Dotted sub-package paths shipped with the package.
    pub packages: Vec<String>,
    /// `false` when the package must be installed unpacked.
    pub zip_safe: bool,
    /// File suffix of installed compiled modules (`so`, `pyd`).
    pub module_suffix: String,
    pub extensions: Vec<ExtensionTarget>,
    pub test: TestSuite,
}

impl PackageDescriptor {
    /// Creates a descriptor with defaults for every optional field.
    pub fn new(
        root: impl Into<PathBuf>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            install_requires: Vec::new(),
            setup_requires: Vec::new(),
            tests_require: Vec::new(),
            packages: Vec::new(),
            zip_safe: false,
            module_suffix: DEFAULT_MODULE_SUFFIX.to_string(),
            extensions: Vec::new(),
            test: TestSuite::default(),
        }
    }

    /// Validates declaration-level descriptor invariants.
    pub fn validate(&self) -> ConfigResult<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ConfigurationError::EmptyName);
        }
        if !PACKAGE_NAME_RE.is_match(name) {
            return Err(ConfigurationError::InvalidName(self.name.clone()));
        }

        let version = self.version.trim();
        if version.is_empty() {
            return Err(ConfigurationError::EmptyVersion);
        }
        if semver::Version::parse(version).is_err() {
            return Err(ConfigurationError::InvalidVersion(self.version.clone()));
        }

        validate_requirements(INSTALL_REQUIRES, &self.install_requires)?;
        validate_requirements(SETUP_REQUIRES, &self.setup_requires)?;
        validate_requirements(TESTS_REQUIRE, &self.tests_require)?;

        for package in &self.packages {
            if !is_module_path(package) {
                return Err(ConfigurationError::InvalidPackagePath(package.clone()));
            }
        }

        if !SUFFIX_RE.is_match(&self.module_suffix) {
            return Err(ConfigurationError::InvalidModuleSuffix(self.module_suffix.clone()));
        }

        let mut modules = BTreeSet::<&str>::new();
        for target in &self.extensions {
            target.validate()?;
            if !modules.insert(target.module.as_str()) {
                return Err(ConfigurationError::DuplicateModulePath(target.module.clone()));
            }
        }
        if self.zip_safe && !self.extensions.is_empty() {
            return Err(ConfigurationError::ZipSafeWithExtensions);
        }

        if self.test.runner.trim().is_empty() {
            return Err(ConfigurationError::EmptyTestRunner);
        }
        if self.test.dir.as_os_str().is_empty() {
            return Err(ConfigurationError::EmptyTestDir);
        }
        Ok(())
    }

    /// Everything the test suite needs installed: runtime plus test-only deps.
    pub fn test_requirements(&self) -> Vec<String> {
        self.install_requires
            .iter()
            .chain(self.tests_require.iter())
            .cloned()
            .collect()
    }

    /// Installed location of `target`'s compiled module.
    pub fn module_file(&self, target: &ExtensionTarget) -> PathBuf {
        target.module_file(&self.root, &self.module_suffix)
    }
}

fn validate_requirements(list: &'static str, values: &[String]) -> ConfigResult<()> {
    let mut seen = BTreeSet::<String>::new();
    for value in values {
        let Some(captures) = REQUIREMENT_RE.captures(value.trim()) else {
            return Err(ConfigurationError::InvalidDependency {
                list,
                value: value.clone(),
            });
        };
        if !seen.insert(normalize_requirement_name(&captures["name"])) {
            return Err(ConfigurationError::DuplicateDependency {
                list,
                value: value.clone(),
            });
        }
    }
    Ok(())
}

/// `Foo_Bar.baz` and `foo-bar-baz` name the same distribution.
fn normalize_requirement_name(name: &str) -> String {
    name.to_ascii_lowercase().replace(['_', '.'], "-")
}
