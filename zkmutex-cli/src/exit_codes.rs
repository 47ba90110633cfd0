//! Process exit codes

/// Normal termination
pub const EXIT_SUCCESS: i32 = 0;
/// Precondition, configuration or coordination failure
pub const EXIT_ERROR: i32 = 1;
/// Command line usage error
pub const EXIT_USAGE: i32 = 2;
