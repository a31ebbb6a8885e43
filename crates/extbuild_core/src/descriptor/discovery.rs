//! Sub-package discovery under the project root.
//!
//! # Invariants
//! - A directory is a package only when it holds the marker file and every
//!   ancestor up to the root is a package too.
//! - Hidden directories, build output directories and excluded paths are
//!   never entered.
//! - Results are dotted names in lexicographic order.

use super::target::is_module_path;
use super::{ConfigResult, ConfigurationError};
use log::debug;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Marker file identifying a package directory.
pub const DEFAULT_PACKAGE_MARKER: &str = "__init__.py";

const SKIPPED_DIR_NAMES: &[&str] = &["target", "build", "dist"];

/// Lists dotted package paths under `root`.
///
/// `exclude` holds directories pruned from the walk (e.g. the test suite).
pub fn discover_packages(
    root: &Path,
    marker: &str,
    exclude: &[PathBuf],
) -> ConfigResult<Vec<String>> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| is_package_dir(entry, marker, exclude));

    let mut packages = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|err| ConfigurationError::Discovery(err.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|err| ConfigurationError::Discovery(err.to_string()))?;
        let dotted = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join(".");
        packages.push(dotted);
    }

    packages.sort();
    debug!(
        "event=package_discovery module=descriptor status=ok root={} count={}",
        root.display(),
        packages.len()
    );
    Ok(packages)
}

fn is_package_dir(entry: &DirEntry, marker: &str, exclude: &[PathBuf]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let Some(name) = entry.file_name().to_str() else {
        return false;
    };
    if name.starts_with('.') || SKIPPED_DIR_NAMES.contains(&name) || !is_module_path(name) {
        return false;
    }
    if exclude.iter().any(|excluded| excluded == entry.path()) {
        return false;
    }
    entry.path().join(marker).is_file()
}
