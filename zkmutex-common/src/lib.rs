//! # zkmutex common
//!
//! Foundational pieces shared by the zkmutex crates.
//!
//! ## Modules
//!
//! - [`error`] - Severity classification implemented by every error type
//! - [`logging`] - Subscriber setup, initialization state and the [`Pretty`] dump wrapper

pub mod error;
pub mod logging;

pub use error::{ErrorSeverity, Severity};
pub use logging::{init_logging, is_logging_initialized, Pretty, Verbosity};
