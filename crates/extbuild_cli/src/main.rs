//! `extbuild` command-line entry point.
//!
//! # Responsibility
//! - Parse arguments, bootstrap logging and dispatch one action.
//! - Own process termination: the only `std::process::exit` in the workspace.
//!
//! # Exit codes
//! - `test` exits with the test runner's own code.
//! - Orchestrator failures exit with `OrchestratorError::exit_code`.
//! - Usage errors exit with `EXIT_CONFIG`, never with a runner-range code.

use clap::Parser;
use extbuild_core::{
    core_version, default_log_level, init_logging, load_descriptor, ActionTable, BuildOptions,
    Orchestrator, OrchestratorError, DEFAULT_DESCRIPTOR_FILE, EXIT_CONFIG,
};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "extbuild")]
#[command(version = core_version())]
#[command(about = "Build native extension modules and run the test suite", long_about = None)]
struct Cli {
    /// Path to the project descriptor
    #[arg(short, long, default_value = DEFAULT_DESCRIPTOR_FILE)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Absolute directory for rotating log files; stderr when omitted
    #[arg(long)]
    log_dir: Option<String>,

    /// Build with the unoptimized toolchain profile
    #[arg(long)]
    debug: bool,

    /// Action to run (`build` or `test`)
    action: String,
}

fn main() {
    let code = match Cli::try_parse() {
        Ok(cli) => run(cli),
        Err(err) => usage_exit_code(&err),
    };
    std::process::exit(code);
}

/// Prints a clap outcome and maps it to an exit code.
///
/// `--help` and `--version` succeed; argument errors are configuration errors.
fn usage_exit_code(err: &clap::Error) -> i32 {
    let _ = err.print();
    if err.use_stderr() {
        EXIT_CONFIG
    } else {
        0
    }
}

fn run(cli: Cli) -> i32 {
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    if let Err(err) = init_logging(level, cli.log_dir.as_deref()) {
        eprintln!("extbuild: error: {err}");
        return EXIT_CONFIG;
    }

    match execute(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("extbuild: error: {err}");
            err.exit_code()
        }
    }
}

fn execute(cli: &Cli) -> Result<i32, OrchestratorError> {
    let table = ActionTable::standard();
    let action = table.resolve(&cli.action)?;
    let descriptor = load_descriptor(&cli.config)?;
    let orchestrator =
        Orchestrator::new(descriptor).with_options(BuildOptions { release: !cli.debug });
    info!(
        "event=cli_dispatch module=cli status=start action={} package={} targets={}",
        cli.action.trim(),
        orchestrator.descriptor().name,
        orchestrator.descriptor().extensions.len()
    );

    let invocation = action(&orchestrator)?;
    for module in &invocation.modules {
        println!("installed {module}");
    }
    Ok(invocation.exit_code())
}
