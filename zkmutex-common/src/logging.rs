//! Logging utilities for zkmutex
//!
//! Holds the subscriber setup used by the binary, the flag telling fatal
//! error reporting whether the subscriber is up yet, and the [`Pretty`]
//! wrapper for structured dumps.

use serde::Serialize;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Verbosity selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    /// Informational messages
    #[default]
    Normal,
    /// Debug output
    Debug,
    /// Everything, including trace output
    Verbose,
}

impl Verbosity {
    /// Pick the verbosity from the global flags, quiet wins
    pub fn from_flags(verbose: bool, debug: bool, quiet: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Tracing level for this verbosity
    pub fn level(self) -> tracing::Level {
        match self {
            Verbosity::Quiet => tracing::Level::ERROR,
            Verbosity::Normal => tracing::Level::INFO,
            Verbosity::Debug => tracing::Level::DEBUG,
            Verbosity::Verbose => tracing::Level::TRACE,
        }
    }

    /// Filter directive handed to the subscriber
    pub fn filter_directive(self) -> String {
        format!("zookeeper_client=warn,{}", self.level())
    }
}

/// Install the stderr subscriber
///
/// `RUST_LOG` overrides the verbosity when set. Calling this twice is harmless;
/// the second subscriber is not installed.
pub fn init_logging(verbosity: Verbosity) {
    use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    let installed = registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok();

    if installed {
        LOGGING_INITIALIZED.store(true, Ordering::SeqCst);
    }
}

/// Whether [`init_logging`] installed a subscriber
pub fn is_logging_initialized() -> bool {
    LOGGING_INITIALIZED.load(Ordering::SeqCst)
}

/// Wrapper for pretty-printing types in logs as YAML
///
/// Use this in tracing statements or on stderr to format complex types
/// as YAML with a newline before the content:
///
/// ```ignore
/// use zkmutex_common::Pretty;
/// use tracing::info;
///
/// info!("Config: {}", Pretty(&config));
/// ```
///
/// Debug is used as a fallback if YAML serialization fails.
pub struct Pretty<T>(pub T);

impl<T: Serialize + Debug> std::fmt::Display for Pretty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_yaml_ng::to_string(&self.0) {
            Ok(yaml) => write!(f, "\n{}", yaml),
            Err(_) => write!(f, "\n{:#?}", self.0),
        }
    }
}

impl<T: Serialize + Debug> std::fmt::Debug for Pretty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}
