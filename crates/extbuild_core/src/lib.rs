//! Native-extension build and test orchestration.
//! This crate owns the descriptor model, the build pipeline and the action table.

pub mod build;
pub mod descriptor;
pub mod logging;
pub mod orchestrator;
pub mod runner;

pub use build::{
    build_extension, BuildError, BuildOptions, BuildResult, CargoToolchain, CompiledModulePath,
    Toolchain,
};
pub use descriptor::{
    load_descriptor, parse_descriptor, ConfigurationError, ExtensionTarget, PackageDescriptor,
    TestSuite, DEFAULT_DESCRIPTOR_FILE,
};
pub use logging::{default_log_level, init_logging, logging_status, LogDestination};
pub use orchestrator::{
    ActionFn, ActionTable, CommandInvocation, Orchestrator, OrchestratorError, ACTION_BUILD,
    ACTION_TEST, EXIT_CONFIG,
};
pub use runner::{ProcessTestRunner, TestRunner};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
