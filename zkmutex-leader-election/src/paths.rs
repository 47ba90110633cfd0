//! Node layout of a sync group

use crate::coordinator::join_path;

/// Paths used by the participants of one sync group
///
/// ```text
/// /<sync-group>/lock/ballot-0000000042    ephemeral, sequential
/// /<sync-group>/members/<hostname>        ephemeral
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    group: String,
}

impl JobPaths {
    /// Layout for a sync group id
    pub fn new(sync_group: &str) -> Self {
        Self {
            group: join_path("/", sync_group.trim_matches('/')),
        }
    }

    /// Root node of the sync group
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Parent of all ballots
    pub fn lock(&self) -> String {
        join_path(&self.group, "lock")
    }

    /// Parent of all membership markers
    pub fn members(&self) -> String {
        join_path(&self.group, "members")
    }

    /// Membership marker of one participant
    pub fn member(&self, name: &str) -> String {
        join_path(&self.members(), name)
    }
}
