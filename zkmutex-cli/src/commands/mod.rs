//! Command modules for the zkmutex CLI
//!
//! Each command lives in its own module with its logic and its help text.

pub mod check;
pub mod run;
