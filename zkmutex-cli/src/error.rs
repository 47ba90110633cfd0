//! Error handling for the zkmutex CLI
//!
//! Keeps the error chain intact while carrying the exit code the process
//! should end with.

use std::error::Error;
use std::fmt;

use zkmutex_common::{is_logging_initialized, ErrorSeverity, Pretty, Severity};
use zkmutex_config::ConfigError;
use zkmutex_leader_election::CoordinationError;

use crate::exit_codes::EXIT_ERROR;
use crate::supervisor::SupervisorError;
use crate::validate::ValidationError;

pub type CliResult<T> = Result<T, CliError>;

/// CLI error type that includes both error information and suggested exit code
#[derive(Debug)]
pub struct CliError {
    pub message: String,
    pub exit_code: i32,
    pub severity: ErrorSeverity,
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: i32) -> Self {
        Self {
            message: message.into(),
            exit_code,
            severity: ErrorSeverity::Error,
            source: None,
        }
    }

    fn wrap<E>(message: impl Into<String>, error: E) -> Self
    where
        E: Error + Severity + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            exit_code: EXIT_ERROR,
            severity: error.severity(),
            source: Some(Box::new(error)),
        }
    }

    /// Get the full error chain as a formatted string
    pub fn full_chain(&self) -> String {
        let mut result = self.message.clone();
        for cause in self.causes() {
            result.push_str(&format!("\n  Caused by: {cause}"));
        }
        result
    }

    /// Messages of the source chain, outermost first
    pub fn causes(&self) -> Vec<String> {
        std::iter::successors(self.source(), |e| (*e).source())
            .map(ToString::to_string)
            .collect()
    }

    /// Report a fatal error and return the exit code
    ///
    /// Goes through tracing once logging is up. Before that a structured dump
    /// and a plain line are written to stderr.
    pub fn report(&self) -> i32 {
        if is_logging_initialized() {
            tracing::error!("{}", self.full_chain());
        } else {
            let chain = self.causes();
            eprintln!(
                "{:?}",
                Pretty(serde_json::json!({
                    "error": self.message,
                    "severity": self.severity.to_string(),
                    "exit_code": self.exit_code,
                    "caused_by": chain,
                }))
            );
            eprintln!("zkmutex: {}", self.full_chain());
        }
        self.exit_code
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        Self::wrap("Failed to load configuration", error)
    }
}

impl From<ValidationError> for CliError {
    fn from(error: ValidationError) -> Self {
        Self::wrap("Precondition failed", error)
    }
}

impl From<CoordinationError> for CliError {
    fn from(error: CoordinationError) -> Self {
        Self::wrap("Failed to connect to the ensemble", error)
    }
}

impl From<SupervisorError> for CliError {
    fn from(error: SupervisorError) -> Self {
        Self::wrap("Coordination failed", error)
    }
}
