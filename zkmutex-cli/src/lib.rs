//! zkmutex command line interface
//!
//! The `zkmutex` binary loads the configuration, runs the preflight checks,
//! connects to the ensemble and lets a [`supervisor::Supervisor`] drive the
//! election, the job and the exit policy.

pub mod cli;
pub mod commands;
pub mod error;
pub mod exit_codes;
pub mod job;
pub mod policy;
pub mod supervisor;
pub mod validate;

use zkmutex_common::{init_logging, Verbosity};
use zkmutex_config::ConfigProvider;

use crate::cli::{Cli, Commands};
use crate::error::CliResult;

/// Execute a parsed command line; returns the process exit code
///
/// Preconditions are checked before logging is set up and before the
/// ensemble is contacted, so a bad configuration never creates a ballot.
pub async fn execute(cli: Cli) -> CliResult<i32> {
    let mut provider = ConfigProvider::new().with_overrides(cli.command.overrides());
    if let Some(path) = &cli.config {
        provider = provider.with_explicit_file(path);
    }
    let config = provider.load()?;
    let validated = validate::validate_all(&config)?;

    init_logging(Verbosity::from_flags(cli.verbose, cli.debug, cli.quiet));

    match cli.command {
        Commands::Check => commands::check::handle_command(&validated),
        Commands::Run { .. } => commands::run::handle_command(validated).await,
    }
}
