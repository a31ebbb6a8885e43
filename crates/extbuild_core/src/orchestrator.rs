//! Build orchestrator and action dispatch.
//!
//! # Responsibility
//! - Turn a `PackageDescriptor` into the `build` and `test` actions.
//! - Expose both through one statically typed name -> function table.
//!
//! # Invariants
//! - Targets build sequentially in declaration order; the first failure
//!   stops the action and later targets are never attempted.
//! - The test runner is spawned only after every target built.
//! - Nothing here terminates the process; callers receive the runner's exit
//!   code in `CommandInvocation` and exit at their outermost boundary.

use crate::build::{
    build_extension, BuildError, BuildOptions, BuildResult, CargoToolchain, CompiledModulePath,
    Toolchain,
};
use crate::descriptor::{ConfigurationError, ExtensionTarget, PackageDescriptor};
use crate::runner::{ProcessTestRunner, TestRunner};
use log::{debug, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Action name for compiling every extension target.
pub const ACTION_BUILD: &str = "build";
/// Action name for building, then running the test suite.
pub const ACTION_TEST: &str = "test";

/// Process exit code for configuration errors.
pub const EXIT_CONFIG: i32 = 78;
/// Process exit code when a build manifest does not resolve.
pub const EXIT_MANIFEST_NOT_FOUND: i32 = 66;
/// Process exit code when the toolchain fails.
pub const EXIT_TOOLCHAIN_FAILURE: i32 = 70;
/// Process exit code when a compiled module cannot be installed.
pub const EXIT_INSTALL_FAILURE: i32 = 73;
/// Process exit code when the test runner cannot be started.
pub const EXIT_RUNNER_NOT_FOUND: i32 = 69;

/// Top-level orchestrator failure.
#[derive(Debug)]
pub enum OrchestratorError {
    Configuration(ConfigurationError),
    Build(BuildError),
}

impl OrchestratorError {
    /// Process exit code reported for this failure.
    ///
    /// Kept apart from the low codes test runners commonly return.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => EXIT_CONFIG,
            Self::Build(BuildError::ManifestNotFound { .. }) => EXIT_MANIFEST_NOT_FOUND,
            Self::Build(BuildError::ToolchainFailure { .. }) => EXIT_TOOLCHAIN_FAILURE,
            Self::Build(BuildError::Install { .. }) => EXIT_INSTALL_FAILURE,
            Self::Build(BuildError::RunnerNotFound { .. }) => EXIT_RUNNER_NOT_FOUND,
        }
    }
}

impl Display for OrchestratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "{err}"),
            Self::Build(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(err) => Some(err),
            Self::Build(err) => Some(err),
        }
    }
}

impl From<ConfigurationError> for OrchestratorError {
    fn from(value: ConfigurationError) -> Self {
        Self::Configuration(value)
    }
}

impl From<BuildError> for OrchestratorError {
    fn from(value: BuildError) -> Self {
        Self::Build(value)
    }
}

/// Outcome of one completed orchestrator action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Action name (`build` or `test`).
    pub action: &'static str,
    /// Modules installed by this action, in build order.
    pub modules: Vec<CompiledModulePath>,
    /// Test runner exit code; `None` for actions that run no tests.
    pub runner_exit_code: Option<i32>,
}

impl CommandInvocation {
    /// Exit code the process should terminate with.
    pub fn exit_code(&self) -> i32 {
        self.runner_exit_code.unwrap_or(0)
    }
}

/// Drives builds and test runs for one descriptor.
pub struct Orchestrator {
    descriptor: PackageDescriptor,
    toolchain: Box<dyn Toolchain>,
    runner: Box<dyn TestRunner>,
    options: BuildOptions,
}

impl Orchestrator {
    /// Creates an orchestrator using cargo and a child-process test runner.
    pub fn new(descriptor: PackageDescriptor) -> Self {
        Self {
            descriptor,
            toolchain: Box::new(CargoToolchain::new()),
            runner: Box::new(ProcessTestRunner),
            options: BuildOptions::default(),
        }
    }

    pub fn with_toolchain(mut self, toolchain: impl Toolchain + 'static) -> Self {
        self.toolchain = Box::new(toolchain);
        self
    }

    pub fn with_runner(mut self, runner: impl TestRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn descriptor(&self) -> &PackageDescriptor {
        &self.descriptor
    }

    /// Compiles one target and installs it under the project root.
    pub fn build(&self, target: &ExtensionTarget) -> BuildResult<CompiledModulePath> {
        let destination = self.descriptor.module_file(target);
        build_extension(target, &destination, self.toolchain.as_ref(), &self.options)
    }

    /// Builds every target in declaration order, stopping at the first failure.
    pub fn build_all(&self) -> BuildResult<Vec<CompiledModulePath>> {
        self.descriptor
            .extensions
            .iter()
            .map(|target| self.build(target))
            .collect()
    }

    /// Builds every target, then runs the test suite.
    ///
    /// The runner's exit code comes back untouched in `runner_exit_code`; a
    /// non-zero code is not an error. Build failures abort before the runner
    /// is spawned.
    pub fn test(&self) -> BuildResult<CommandInvocation> {
        let modules = self.build_all()?;
        debug!(
            "event=test_requirements module=orchestrator status=ok count={} requirements={}",
            self.descriptor.test_requirements().len(),
            self.descriptor.test_requirements().join(";")
        );
        let exit_code = self.runner.run(&self.descriptor.test, &self.descriptor.root)?;
        Ok(CommandInvocation {
            action: ACTION_TEST,
            modules,
            runner_exit_code: Some(exit_code),
        })
    }
}

/// Handler signature shared by every action.
pub type ActionFn = fn(&Orchestrator) -> Result<CommandInvocation, OrchestratorError>;

/// Static mapping from action name to handler, built once at startup.
#[derive(Clone)]
pub struct ActionTable {
    entries: BTreeMap<&'static str, ActionFn>,
}

impl ActionTable {
    /// Table with the `build` and `test` actions.
    pub fn standard() -> Self {
        let mut entries = BTreeMap::<&'static str, ActionFn>::new();
        entries.insert(ACTION_BUILD, run_build);
        entries.insert(ACTION_TEST, run_test);
        Self { entries }
    }

    /// Registered action names in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    /// Looks up the handler for `name`.
    pub fn resolve(&self, name: &str) -> Result<ActionFn, ConfigurationError> {
        self.entries
            .get(name.trim())
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownAction {
                name: name.to_string(),
                known: self.names(),
            })
    }

    /// Resolves `name` and runs it against `orchestrator`.
    pub fn dispatch(
        &self,
        name: &str,
        orchestrator: &Orchestrator,
    ) -> Result<CommandInvocation, OrchestratorError> {
        let action = self.resolve(name)?;
        action(orchestrator)
    }
}

fn run_build(orchestrator: &Orchestrator) -> Result<CommandInvocation, OrchestratorError> {
    let modules = orchestrator.build_all()?;
    info!(
        "event=action_done module=orchestrator status=ok action={} modules={}",
        ACTION_BUILD,
        modules.len()
    );
    Ok(CommandInvocation {
        action: ACTION_BUILD,
        modules,
        runner_exit_code: None,
    })
}

fn run_test(orchestrator: &Orchestrator) -> Result<CommandInvocation, OrchestratorError> {
    let invocation = orchestrator.test()?;
    info!(
        "event=action_done module=orchestrator status=ok action={} modules={} exit_code={}",
        ACTION_TEST,
        invocation.modules.len(),
        invocation.exit_code()
    );
    Ok(invocation)
}
