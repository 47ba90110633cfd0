//! Error types for coordination and leader election

use zkmutex_common::{ErrorSeverity, Severity};

/// Errors raised by a coordination service primitive
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinationError {
    /// The connect string did not contain any server
    #[error("Invalid connect string '{0}': no servers given")]
    InvalidConnectString(String),

    /// The session could not be established
    #[error("Failed to connect to {servers}: {message}")]
    Connect {
        /// Comma separated server list
        servers: String,
        /// Message reported by the client
        message: String,
    },

    /// The node to create already exists
    #[error("Node already exists: {0}")]
    NodeExists(String),

    /// The node (or its parent) does not exist
    #[error("No such node: {0}")]
    NoNode(String),

    /// The session expired or was closed
    #[error("Coordination session lost")]
    SessionLost,

    /// Any other failure reported by the service
    #[error("Coordination request on {path} failed: {message}")]
    Request {
        /// Path the request operated on
        path: String,
        /// Message reported by the client
        message: String,
    },
}

impl Severity for CoordinationError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NodeExists(_) => ErrorSeverity::Warning,
            Self::NoNode(_) | Self::Request { .. } => ErrorSeverity::Error,
            Self::InvalidConnectString(_) | Self::Connect { .. } | Self::SessionLost => {
                ErrorSeverity::Critical
            }
        }
    }
}

/// Errors that end an election attempt
#[derive(Debug, thiserror::Error)]
pub enum ElectionError {
    /// Local hostname could not be determined
    #[error("Failed to determine hostname: {0}")]
    Hostname(String),

    /// Creating the ballot node failed
    #[error("Failed to create ballot under {lock_path}: {source}")]
    BallotCreation {
        /// Lock path the ballot was created under
        lock_path: String,
        /// Underlying coordination failure
        #[source]
        source: CoordinationError,
    },

    /// Listing the lock path children (or rearming the watch) failed
    #[error("Failed to list ballots under {lock_path}: {source}")]
    Children {
        /// Lock path that was listed
        lock_path: String,
        /// Underlying coordination failure
        #[source]
        source: CoordinationError,
    },

    /// Our own ballot is no longer among the children of the lock path
    #[error("Ballot {0} vanished before the election finished")]
    BallotVanished(String),

    /// The session ended while waiting for a change
    #[error("Coordination session lost during election")]
    SessionLost,

    /// The election task panicked or was aborted
    #[error("Election task ended abnormally: {0}")]
    Task(String),
}

impl Severity for ElectionError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::SessionLost | Self::Task(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Result type for coordination primitives
pub type Result<T> = std::result::Result<T, CoordinationError>;
