//! Native extension build pipeline.
//!
//! # Responsibility
//! - Resolve a target's build manifest before anything touches the disk.
//! - Drive the external toolchain and install its artifact as an importable
//!   module under the project root.
//!
//! # Invariants
//! - A missing manifest fails with `ManifestNotFound` and writes nothing.
//! - Toolchain diagnostics are carried verbatim, never rewritten.
//! - Installation replaces the module atomically, so rebuilding is safe.

use crate::descriptor::ExtensionTarget;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

mod install;
mod toolchain;

pub use install::{install_artifact, DEFAULT_MODULE_SUFFIX};
pub use toolchain::{CargoToolchain, Toolchain};

pub type BuildResult<T> = Result<T, BuildError>;

/// Fatal failures of the `build` step and of spawning the test runner.
#[derive(Debug)]
pub enum BuildError {
    /// Build manifest path does not resolve to a file.
    ManifestNotFound { module: String, manifest: PathBuf },
    /// Toolchain could not be launched, exited non-zero, or produced no
    /// shared library. `diagnostic` is the toolchain's own output.
    ToolchainFailure {
        module: String,
        status: Option<i32>,
        diagnostic: String,
    },
    /// Compiled artifact could not be placed at the module path.
    Install {
        module: String,
        destination: PathBuf,
        source: std::io::Error,
    },
    /// Test runner executable could not be started.
    RunnerNotFound {
        program: String,
        source: std::io::Error,
    },
}

impl BuildError {
    /// Stable error code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ManifestNotFound { .. } => "manifest_not_found",
            Self::ToolchainFailure { .. } => "toolchain_failure",
            Self::Install { .. } => "install_failed",
            Self::RunnerNotFound { .. } => "runner_not_found",
        }
    }
}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ManifestNotFound { module, manifest } => write!(
                f,
                "build manifest for `{module}` not found: {}",
                manifest.display()
            ),
            Self::ToolchainFailure {
                module,
                status,
                diagnostic,
            } => {
                match status {
                    Some(code) => write!(
                        f,
                        "toolchain failed to build `{module}` (exit status {code})"
                    )?,
                    None => write!(f, "toolchain failed to build `{module}`")?,
                }
                if diagnostic.is_empty() {
                    Ok(())
                } else {
                    write!(f, ":\n{diagnostic}")
                }
            }
            Self::Install {
                module,
                destination,
                source,
            } => write!(
                f,
                "cannot install `{module}` at {}: {source}",
                destination.display()
            ),
            Self::RunnerNotFound { program, source } => {
                write!(f, "cannot start test runner `{program}`: {source}")
            }
        }
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Install { source, .. } | Self::RunnerNotFound { source, .. } => Some(source),
            Self::ManifestNotFound { .. } | Self::ToolchainFailure { .. } => None,
        }
    }
}

/// Options shared by every target built in one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Build with the optimized toolchain profile.
    pub release: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { release: true }
    }
}

/// Location of an installed, importable compiled module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModulePath(PathBuf);

impl CompiledModulePath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl Display for CompiledModulePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Builds one target and installs it at `destination`.
///
/// # Errors
/// - `ManifestNotFound` before the toolchain runs; nothing is written.
/// - `ToolchainFailure` with the toolchain diagnostic unmodified.
/// - `Install` when the artifact cannot be copied into place.
pub fn build_extension(
    target: &ExtensionTarget,
    destination: &Path,
    toolchain: &dyn Toolchain,
    options: &BuildOptions,
) -> BuildResult<CompiledModulePath> {
    let started_at = Instant::now();
    info!(
        "event=extension_build module=build status=start target={} toolchain={} release={}",
        target.module,
        toolchain.name(),
        options.release
    );

    let result = resolve_manifest(target)
        .and_then(|manifest| toolchain.compile(target, &manifest, options))
        .and_then(|artifact| {
            install_artifact(&artifact, destination).map_err(|source| BuildError::Install {
                module: target.module.clone(),
                destination: destination.to_path_buf(),
                source,
            })
        });

    match result {
        Ok(()) => {
            info!(
                "event=extension_build module=build status=ok target={} duration_ms={} path={}",
                target.module,
                started_at.elapsed().as_millis(),
                destination.display()
            );
            Ok(CompiledModulePath(destination.to_path_buf()))
        }
        Err(err) => {
            error!(
                "event=extension_build module=build status=error target={} duration_ms={} error_code={}",
                target.module,
                started_at.elapsed().as_millis(),
                err.code()
            );
            Err(err)
        }
    }
}

fn resolve_manifest(target: &ExtensionTarget) -> BuildResult<PathBuf> {
    let not_found = || BuildError::ManifestNotFound {
        module: target.module.clone(),
        manifest: target.manifest.clone(),
    };
    let manifest = target.manifest.canonicalize().map_err(|_| not_found())?;
    if !manifest.is_file() {
        return Err(not_found());
    }
    Ok(manifest)
}
