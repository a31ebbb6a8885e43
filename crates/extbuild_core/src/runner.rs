//! External test-runner invocation.
//!
//! # Responsibility
//! - Spawn the configured runner over the test directory and wait for it.
//! - Report the runner's exit status as a plain integer for pass-through.
//!
//! # Invariants
//! - A runner that starts and exits non-zero is a result, not an error.
//! - Only a failure to start the runner is reported as `RunnerNotFound`.
//! - The wait is blocking with no timeout.

use crate::build::{BuildError, BuildResult};
use crate::descriptor::TestSuite;
use log::{error, info};
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::time::Instant;

/// Exit code reported when the platform gives neither a code nor a signal.
const UNKNOWN_EXIT_CODE: i32 = 1;

/// Runs a test suite and returns the runner's exit code.
pub trait TestRunner {
    fn run(&self, suite: &TestSuite, working_dir: &Path) -> BuildResult<i32>;
}

/// Spawns the runner as a child process sharing this process's stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTestRunner;

impl TestRunner for ProcessTestRunner {
    fn run(&self, suite: &TestSuite, working_dir: &Path) -> BuildResult<i32> {
        let started_at = Instant::now();
        info!(
            "event=test_run module=runner status=start runner={} dir={}",
            suite.runner,
            suite.dir.display()
        );

        let status = Command::new(&suite.runner)
            .args(&suite.args)
            .arg(&suite.dir)
            .current_dir(working_dir)
            .status()
            .map_err(|source| {
                error!(
                    "event=test_run module=runner status=error runner={} error_code=runner_not_found error={}",
                    suite.runner, source
                );
                BuildError::RunnerNotFound {
                    program: suite.runner.clone(),
                    source,
                }
            })?;

        let code = exit_code(status);
        info!(
            "event=test_run module=runner status=ok runner={} duration_ms={} exit_code={}",
            suite.runner,
            started_at.elapsed().as_millis(),
            code
        );
        Ok(code)
    }
}

/// Maps a child's exit status onto the code a shell would report.
///
/// Signal terminations become `128 + signal` on Unix.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    UNKNOWN_EXIT_CODE
}

#[cfg(all(test, unix))]
mod tests {
    use super::{ProcessTestRunner, TestRunner};
    use crate::build::BuildError;
    use crate::descriptor::TestSuite;
    use std::path::PathBuf;

    fn shell_suite(script: &str) -> TestSuite {
        TestSuite {
            runner: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            dir: PathBuf::from("tests"),
        }
    }

    #[test]
    fn forwards_runner_exit_codes_exactly() {
        let dir = tempfile::tempdir().unwrap();
        for expected in [0, 1, 2, 5, 127] {
            let code = ProcessTestRunner
                .run(&shell_suite(&format!("exit {expected}")), dir.path())
                .unwrap();
            assert_eq!(code, expected);
        }
    }

    #[test]
    fn passes_test_dir_as_last_argument_from_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("tests")).unwrap();
        let code = ProcessTestRunner
            .run(&shell_suite(r#"test "$1" = tests && test -d "$1""#), dir.path())
            .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn signal_termination_maps_to_shell_convention() {
        let dir = tempfile::tempdir().unwrap();
        let code = ProcessTestRunner
            .run(&shell_suite("kill -TERM $$"), dir.path())
            .unwrap();
        assert_eq!(code, 128 + 15);
    }

    #[test]
    fn missing_runner_is_runner_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let suite = TestSuite {
            runner: "extbuild-no-such-runner".to_string(),
            ..TestSuite::default()
        };
        let err = ProcessTestRunner.run(&suite, dir.path()).unwrap_err();
        match err {
            BuildError::RunnerNotFound { program, .. } => {
                assert_eq!(program, "extbuild-no-such-runner")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
