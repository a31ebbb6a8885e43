//! Package descriptor model, loading and validation.
//!
//! # Responsibility
//! - Hold the static package metadata and extension targets for one run.
//! - Load the descriptor file and resolve its paths against the project root.
//! - Reject malformed declarations before any build is attempted.
//!
//! # Invariants
//! - A descriptor returned by `load_descriptor` has passed `validate()`.
//! - All paths inside a loaded descriptor are rooted at the project root.
//! - Configuration errors are fatal; nothing here retries.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod discovery;
mod load;
pub mod package;
pub mod target;

pub use discovery::{discover_packages, DEFAULT_PACKAGE_MARKER};
pub use load::{load_descriptor, parse_descriptor, DEFAULT_DESCRIPTOR_FILE};
pub use package::{PackageDescriptor, TestSuite, DEFAULT_TEST_DIR, DEFAULT_TEST_RUNNER};
pub use target::ExtensionTarget;

pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Malformed or missing package/extension metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Descriptor file could not be read.
    Read { path: PathBuf, message: String },
    /// Descriptor file is not valid TOML or has unknown/missing keys.
    Parse { path: PathBuf, message: String },
    EmptyName,
    InvalidName(String),
    EmptyVersion,
    InvalidVersion(String),
    InvalidDependency {
        list: &'static str,
        value: String,
    },
    DuplicateDependency {
        list: &'static str,
        value: String,
    },
    InvalidModulePath(String),
    DuplicateModulePath(String),
    InvalidPackagePath(String),
    EmptyManifestPath(String),
    InvalidModuleSuffix(String),
    /// Compiled extensions cannot be imported from a compressed archive.
    ZipSafeWithExtensions,
    EmptyTestRunner,
    EmptyTestDir,
    /// Package discovery could not walk the project root.
    Discovery(String),
    UnknownAction {
        name: String,
        known: Vec<&'static str>,
    },
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, message } => {
                write!(f, "cannot read descriptor `{}`: {message}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "malformed descriptor `{}`: {message}", path.display())
            }
            Self::EmptyName => write!(f, "package name must not be empty"),
            Self::InvalidName(value) => write!(f, "package name is invalid: {value}"),
            Self::EmptyVersion => write!(f, "package version must not be empty"),
            Self::InvalidVersion(value) => write!(
                f,
                "package version is invalid: {value} (expected semantic version)"
            ),
            Self::InvalidDependency { list, value } => {
                write!(f, "{list} contains an invalid dependency: `{value}`")
            }
            Self::DuplicateDependency { list, value } => {
                write!(f, "{list} declares `{value}` more than once")
            }
            Self::InvalidModulePath(value) => write!(
                f,
                "extension module path is invalid: `{value}` (expected dotted identifiers)"
            ),
            Self::DuplicateModulePath(value) => {
                write!(f, "extension module path is declared twice: {value}")
            }
            Self::InvalidPackagePath(value) => {
                write!(f, "package path is invalid: `{value}`")
            }
            Self::EmptyManifestPath(module) => {
                write!(f, "extension `{module}` has an empty build manifest path")
            }
            Self::InvalidModuleSuffix(value) => {
                write!(f, "module suffix is invalid: `{value}`")
            }
            Self::ZipSafeWithExtensions => write!(
                f,
                "package declares compiled extensions and must not be zip-safe"
            ),
            Self::EmptyTestRunner => write!(f, "test runner program must not be empty"),
            Self::EmptyTestDir => write!(f, "test directory must not be empty"),
            Self::Discovery(message) => write!(f, "package discovery failed: {message}"),
            Self::UnknownAction { name, known } => write!(
                f,
                "unknown action `{name}`; expected one of {}",
                known.join("|")
            ),
        }
    }
}

impl Error for ConfigurationError {}
