//! Check command implementation
//!
//! Validates the configuration without touching the ensemble

use crate::error::{CliError, CliResult};
use crate::exit_codes::{EXIT_ERROR, EXIT_SUCCESS};
use crate::validate::ValidatedConfig;

/// Help text for the check command
pub const DESCRIPTION: &str = include_str!("description.md");

/// Print the validated configuration
pub fn handle_command(validated: &ValidatedConfig) -> CliResult<i32> {
    let yaml = serde_yaml_ng::to_string(validated).map_err(|e| {
        CliError::new(format!("Failed to render configuration: {}", e), EXIT_ERROR)
    })?;
    print!("{}", yaml);
    Ok(EXIT_SUCCESS)
}
