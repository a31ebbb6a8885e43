//! External compiler/linker toolchain seam.

use super::{BuildError, BuildOptions, BuildResult};
use crate::descriptor::ExtensionTarget;
use log::debug;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Compiles one extension target from its build manifest.
pub trait Toolchain {
    /// Short name for log events (e.g. `cargo`).
    fn name(&self) -> &str;

    /// Runs the toolchain for `target` using the resolved `manifest`.
    ///
    /// Returns the path of the produced shared library. Failures carry the
    /// toolchain's diagnostic text unmodified.
    fn compile(
        &self,
        target: &ExtensionTarget,
        manifest: &Path,
        options: &BuildOptions,
    ) -> BuildResult<PathBuf>;
}

/// Cargo-driven toolchain producing `cdylib` artifacts.
#[derive(Debug, Clone)]
pub struct CargoToolchain {
    program: OsString,
}

impl CargoToolchain {
    /// Uses `$CARGO` when set, `cargo` from `PATH` otherwise.
    pub fn new() -> Self {
        let program = std::env::var_os("CARGO").unwrap_or_else(|| OsString::from("cargo"));
        Self::with_program(program)
    }

    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(
        &self,
        target: &ExtensionTarget,
        manifest: &Path,
        options: &BuildOptions,
    ) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("build")
            .arg("--manifest-path")
            .arg(manifest)
            .arg("--lib")
            .arg("--message-format=json-render-diagnostics");
        if options.release {
            cmd.arg("--release");
        }
        if !target.features.is_empty() {
            cmd.arg("--features").arg(target.features.join(","));
        }
        cmd.args(&target.args);
        if let Some(dir) = manifest.parent() {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd
    }
}

impl Default for CargoToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Toolchain for CargoToolchain {
    fn name(&self) -> &str {
        "cargo"
    }

    fn compile(
        &self,
        target: &ExtensionTarget,
        manifest: &Path,
        options: &BuildOptions,
    ) -> BuildResult<PathBuf> {
        let failure = |status: Option<i32>, diagnostic: String| BuildError::ToolchainFailure {
            module: target.module.clone(),
            status,
            diagnostic,
        };

        let output = self
            .command(target, manifest, options)
            .output()
            .map_err(|err| {
                failure(
                    None,
                    format!(
                        "failed to launch `{}`: {err}",
                        self.program.to_string_lossy()
                    ),
                )
            })?;

        let diagnostic = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(failure(output.status.code(), diagnostic));
        }
        debug!(
            "event=toolchain_run module=build status=ok target={} stderr_bytes={}",
            target.module,
            output.stderr.len()
        );

        let stdout = String::from_utf8_lossy(&output.stdout);
        select_artifact(&stdout, manifest).ok_or_else(|| {
            failure(
                output.status.code(),
                format!(
                    "no shared library produced for `{}`; is `crate-type = [\"cdylib\"]` set in {}?",
                    target.module,
                    manifest.display()
                ),
            )
        })
    }
}

#[derive(Debug, Deserialize)]
struct CargoMessage {
    reason: String,
    #[serde(default)]
    manifest_path: Option<PathBuf>,
    #[serde(default)]
    target: Option<CargoTarget>,
    #[serde(default)]
    filenames: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct CargoTarget {
    #[serde(default)]
    crate_types: Vec<String>,
}

/// Picks the `cdylib` artifact from cargo's JSON message stream.
///
/// Prefers the artifact of the package whose manifest is `manifest`; falls
/// back to the last shared library reported.
fn select_artifact(stdout: &str, manifest: &Path) -> Option<PathBuf> {
    let mut matched = None;
    let mut fallback = None;

    for line in stdout.lines() {
        let Ok(message) = serde_json::from_str::<CargoMessage>(line) else {
            continue;
        };
        if message.reason != "compiler-artifact" {
            continue;
        }
        let is_cdylib = message
            .target
            .as_ref()
            .is_some_and(|target| target.crate_types.iter().any(|kind| kind == "cdylib"));
        if !is_cdylib {
            continue;
        }
        let Some(library) = message.filenames.into_iter().find(|path| is_shared_library(path))
        else {
            continue;
        };
        if message.manifest_path.as_deref() == Some(manifest) {
            matched = Some(library);
        } else {
            fallback = Some(library);
        }
    }

    matched.or(fallback)
}

fn is_shared_library(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("so" | "dylib" | "dll")
    )
}
