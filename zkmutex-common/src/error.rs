//! Error classification shared by the zkmutex crates
//!
//! Each crate defines its own `thiserror` enum. This module only provides the
//! severity vocabulary they all implement, so the binary can decide between a
//! warning, a failed attempt and a fatal abort without knowing every variant.

/// Severity levels for error classification
///
/// # Severity Levels
///
/// - **Warning**: Potential issue but operation can proceed. A membership
///   marker that could not be created is the typical case.
/// - **Error**: The current attempt failed but the process may try again, for
///   example a lost election under the `reacquire-lock` policy.
/// - **Critical**: The process cannot continue. Invalid preconditions and an
///   unreachable ensemble fall into this class.
///
/// # Examples
///
/// ```rust
/// use zkmutex_common::ErrorSeverity;
///
/// let cosmetic = ErrorSeverity::Warning;
/// let retryable = ErrorSeverity::Error;
/// let fatal = ErrorSeverity::Critical;
/// assert!(fatal > retryable && retryable > cosmetic);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Potential issue but operation can proceed
    Warning,

    /// Operation failed but the process can continue
    Error,

    /// Process cannot continue
    Critical,
}

impl ErrorSeverity {
    /// Whether an error of this severity must end the process
    pub fn is_fatal(self) -> bool {
        self == ErrorSeverity::Critical
    }
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorSeverity::Warning => "warning",
            ErrorSeverity::Error => "error",
            ErrorSeverity::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// Trait for error types that have severity levels
///
/// # Example
///
/// ```rust
/// use zkmutex_common::{ErrorSeverity, Severity};
///
/// #[derive(Debug)]
/// enum SetupError {
///     Unreachable,
///     MarkerExists,
/// }
///
/// impl Severity for SetupError {
///     fn severity(&self) -> ErrorSeverity {
///         match self {
///             SetupError::Unreachable => ErrorSeverity::Critical,
///             SetupError::MarkerExists => ErrorSeverity::Warning,
///         }
///     }
/// }
///
/// assert!(SetupError::Unreachable.severity().is_fatal());
/// ```
pub trait Severity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}
