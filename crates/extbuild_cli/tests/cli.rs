#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const FAKE_CARGO_OK: &str = r#"#!/bin/sh
# $3 is the manifest path passed after --manifest-path.
out="$(dirname "$3")/target/release"
mkdir -p "$out"
printf 'compiled' > "$out/librust_ext.so"
echo "{\"reason\":\"compiler-artifact\",\"manifest_path\":\"$3\",\"target\":{\"crate_types\":[\"cdylib\"]},\"filenames\":[\"$out/librust_ext.so\"]}"
echo '{"reason":"build-finished","success":true}'
"#;

const FAKE_CARGO_FAIL: &str = r#"#!/bin/sh
printf 'error[E0308]: mismatched types\n' >&2
exit 101
"#;

struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    fn new(cargo_script: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-cargo");
        fs::write(&script, cargo_script).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        fs::create_dir(dir.path().join("tests")).unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn with_manifest(self) -> Self {
        fs::write(self.root().join("Cargo.toml"), "[package]\nname = \"rust_ext\"\n").unwrap();
        self
    }

    fn write_descriptor(&self, runner_script: &str) -> PathBuf {
        let descriptor = self.root().join("extbuild.toml");
        fs::write(
            &descriptor,
            format!(
                r#"
[package]
name = "rust_ext"
version = "0.1.0"
module-suffix = "so"

[[extension]]
module = "rust_ext.rust_ext"
manifest = "Cargo.toml"

[test]
runner = "sh"
args = ["-c", "{runner_script}", "sh"]
"#
            ),
        )
        .unwrap();
        descriptor
    }

    fn run(&self, action: &str) -> Output {
        Command::new(env!("CARGO_BIN_EXE_extbuild"))
            .arg("--config")
            .arg(self.root().join("extbuild.toml"))
            .arg("--log-level")
            .arg("error")
            .arg(action)
            .current_dir(self.root())
            .env("CARGO", self.root().join("fake-cargo"))
            .output()
            .unwrap()
    }

    fn module(&self) -> PathBuf {
        self.root().join("rust_ext").join("rust_ext.so")
    }

    fn runner_marker(&self) -> PathBuf {
        self.root().join("runner-ran")
    }
}

#[test]
fn test_exits_with_runner_code() {
    let project = Project::new(FAKE_CARGO_OK).with_manifest();
    project.write_descriptor("exit 5");

    let output = project.run("test");

    assert_eq!(output.status.code(), Some(5));
    assert_eq!(fs::read_to_string(project.module()).unwrap(), "compiled");
}

#[test]
fn passing_suite_exits_zero_and_reports_module() {
    let project = Project::new(FAKE_CARGO_OK).with_manifest();
    project.write_descriptor("touch runner-ran");

    let output = project.run("test");

    assert_eq!(output.status.code(), Some(0));
    assert!(project.runner_marker().is_file());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("rust_ext.so"), "stdout: {stdout}");
}

#[test]
fn build_does_not_run_tests() {
    let project = Project::new(FAKE_CARGO_OK).with_manifest();
    project.write_descriptor("touch runner-ran; exit 3");

    let output = project.run("build");

    assert_eq!(output.status.code(), Some(0));
    assert!(project.module().is_file());
    assert!(!project.runner_marker().exists());
}

#[test]
fn missing_manifest_exits_66_without_running_tests() {
    let project = Project::new(FAKE_CARGO_OK);
    project.write_descriptor("touch runner-ran");

    let output = project.run("test");

    assert_eq!(output.status.code(), Some(66));
    assert!(!project.runner_marker().exists());
    assert!(!project.module().exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not found"), "stderr: {stderr}");
}

#[test]
fn toolchain_failure_exits_70_with_diagnostic() {
    let project = Project::new(FAKE_CARGO_FAIL).with_manifest();
    project.write_descriptor("touch runner-ran");

    let output = project.run("test");

    assert_eq!(output.status.code(), Some(70));
    assert!(!project.runner_marker().exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[E0308]: mismatched types"), "stderr: {stderr}");
}

#[test]
fn unknown_action_exits_78() {
    let project = Project::new(FAKE_CARGO_OK).with_manifest();
    project.write_descriptor("exit 0");

    let output = project.run("install");

    assert_eq!(output.status.code(), Some(78));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("build|test"), "stderr: {stderr}");
}

#[test]
fn invalid_descriptor_exits_78() {
    let project = Project::new(FAKE_CARGO_OK).with_manifest();
    fs::write(
        project.root().join("extbuild.toml"),
        "[package]\nname = \"rust_ext\"\nversion = \"not-a-version\"\n",
    )
    .unwrap();

    let output = project.run("build");

    assert_eq!(output.status.code(), Some(78));
}

#[test]
fn missing_runner_exits_69() {
    let project = Project::new(FAKE_CARGO_OK).with_manifest();
    let descriptor = project.write_descriptor("exit 0");
    let source = fs::read_to_string(&descriptor)
        .unwrap()
        .replace("runner = \"sh\"", "runner = \"extbuild-no-such-runner\"");
    fs::write(&descriptor, source).unwrap();

    let output = project.run("test");

    assert_eq!(output.status.code(), Some(69));
    assert!(project.module().is_file());
}

fn run_with_args(project: &Project, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_extbuild"))
        .args(args)
        .current_dir(project.root())
        .env("CARGO", project.root().join("fake-cargo"))
        .output()
        .unwrap()
}

#[test]
fn missing_action_exits_78_not_a_runner_code() {
    let project = Project::new(FAKE_CARGO_OK).with_manifest();
    project.write_descriptor("touch runner-ran");

    let output = run_with_args(&project, &["--log-level", "error"]);

    assert_eq!(output.status.code(), Some(78));
    assert!(!project.runner_marker().exists());
    assert!(!output.stderr.is_empty());
}

#[test]
fn option_without_value_exits_78() {
    let project = Project::new(FAKE_CARGO_OK).with_manifest();

    let output = run_with_args(&project, &["--config"]);

    assert_eq!(output.status.code(), Some(78));
}

#[test]
fn version_flag_reports_core_version_and_succeeds() {
    let project = Project::new(FAKE_CARGO_OK);

    let output = run_with_args(&project, &["--version"]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(extbuild_core::core_version()), "stdout: {stdout}");
}

#[test]
fn default_log_level_path_builds() {
    let project = Project::new(FAKE_CARGO_OK).with_manifest();
    let descriptor = project.write_descriptor("exit 0");
    let descriptor = descriptor.to_str().unwrap();

    let output = run_with_args(&project, &["--config", descriptor, "build"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(project.module().is_file());
}
