//! The coordination service seam
//!
//! Everything above this module talks to the coordination service through the
//! [`Coordinator`] trait. [`crate::ZkSession`] implements it on top of a real
//! ZooKeeper ensemble and [`crate::MemoryCoordinator`] keeps the same
//! semantics in process.

use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::{CoordinationError, Result};

/// Lifetime and naming of a node to create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Survives the creating session
    Persistent,
    /// Removed when the creating session ends
    Ephemeral,
    /// Ephemeral, with a service assigned sequence suffix
    EphemeralSequential,
}

impl NodeKind {
    /// Whether the node is tied to the creating session
    pub fn is_ephemeral(self) -> bool {
        !matches!(self, Self::Persistent)
    }

    /// Whether the service appends a sequence suffix
    pub fn is_sequential(self) -> bool {
        matches!(self, Self::EphemeralSequential)
    }
}

/// What woke a [`ChangeWatch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A child was added or removed
    ChildrenChanged,
    /// The watched node was created
    Created,
    /// The watched node was deleted
    Deleted,
    /// The watched node's content changed
    DataChanged,
    /// The session expired or was closed
    SessionLost,
}

/// A single-fire change notification
///
/// Resolves exactly once, on the next change after registration. A fresh watch
/// must be requested to observe any later change.
pub struct ChangeWatch(BoxFuture<'static, ChangeEvent>);

impl ChangeWatch {
    /// Wrap a future that resolves on the next change
    pub fn new(fut: BoxFuture<'static, ChangeEvent>) -> Self {
        Self(fut)
    }

    /// Wait for the change
    pub async fn changed(self) -> ChangeEvent {
        self.0.await
    }
}

impl fmt::Debug for ChangeWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChangeWatch")
    }
}

/// Primitives consumed from the coordination service
///
/// All paths are absolute and relative to the session chroot. Nodes are
/// always created with an open ACL.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Create a node and return the path that was actually created
    ///
    /// For sequential nodes the returned path carries the assigned suffix.
    async fn create(&self, path: &str, data: &[u8], kind: NodeKind) -> Result<String>;

    /// List the children of `path` and register a watch for the next change
    async fn children_with_watch(&self, path: &str) -> Result<(Vec<String>, ChangeWatch)>;

    /// Check whether `path` exists and register a watch for the next change
    async fn exists_with_watch(&self, path: &str) -> Result<(bool, ChangeWatch)>;

    /// Delete a node regardless of its version
    async fn delete(&self, path: &str) -> Result<()>;
}

/// A parsed `server1,server2,.../chroot` address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectString {
    servers: Vec<String>,
    chroot: String,
}

impl ConnectString {
    /// Parse an ensemble address
    ///
    /// Everything before the first `/` is the comma separated server list,
    /// everything after it becomes the chroot (default `/`).
    pub fn parse(input: &str) -> Result<Self> {
        let (servers, chroot) = match input.trim().split_once('/') {
            Some((servers, chroot)) => (servers, chroot),
            None => (input.trim(), ""),
        };

        let servers: Vec<String> = servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if servers.is_empty() {
            return Err(CoordinationError::InvalidConnectString(input.to_string()));
        }

        let chroot = chroot.trim_matches('/');
        Ok(Self {
            servers,
            chroot: format!("/{}", chroot),
        })
    }

    /// Servers of the ensemble
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Chroot prefix applied to every path of the session
    pub fn chroot(&self) -> &str {
        &self.chroot
    }

    /// Whether the session runs below the service root
    pub fn has_chroot(&self) -> bool {
        self.chroot != "/"
    }
}

impl fmt::Display for ConnectString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.servers.join(","))?;
        if self.has_chroot() {
            write!(f, "{}", self.chroot)?;
        }
        Ok(())
    }
}

/// Join a parent path and a child name
pub fn join_path(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{}", child)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), child)
    }
}

/// Last segment of a node path
pub fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_servers_and_chroot() {
        let cs = ConnectString::parse("zk1:2181,zk2:2181/jobs/prod").unwrap();
        assert_eq!(cs.servers(), ["zk1:2181", "zk2:2181"]);
        assert_eq!(cs.chroot(), "/jobs/prod");
        assert!(cs.has_chroot());
        assert_eq!(cs.to_string(), "zk1:2181,zk2:2181/jobs/prod");
    }

    #[test]
    fn test_parse_without_chroot_defaults_to_root() {
        let cs = ConnectString::parse("zk1:2181").unwrap();
        assert_eq!(cs.servers(), ["zk1:2181"]);
        assert_eq!(cs.chroot(), "/");
        assert!(!cs.has_chroot());
        assert_eq!(cs.to_string(), "zk1:2181");
    }

    #[test]
    fn test_parse_trailing_slash_is_root() {
        let cs = ConnectString::parse("zk1:2181/").unwrap();
        assert_eq!(cs.chroot(), "/");
    }

    #[test]
    fn test_parse_rejects_empty_ensemble() {
        assert!(matches!(
            ConnectString::parse(""),
            Err(CoordinationError::InvalidConnectString(_))
        ));
        assert!(matches!(
            ConnectString::parse("/chroot"),
            Err(CoordinationError::InvalidConnectString(_))
        ));
        assert!(matches!(
            ConnectString::parse(" , "),
            Err(CoordinationError::InvalidConnectString(_))
        ));
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "group"), "/group");
        assert_eq!(join_path("/group", "lock"), "/group/lock");
        assert_eq!(join_path("/group/", "lock"), "/group/lock");
    }

    #[test]
    fn test_node_name() {
        assert_eq!(node_name("/group/lock/ballot-0000000003"), "ballot-0000000003");
        assert_eq!(node_name("ballot-0000000003"), "ballot-0000000003");
    }

    #[test]
    fn test_node_kind_flags() {
        assert!(!NodeKind::Persistent.is_ephemeral());
        assert!(NodeKind::Ephemeral.is_ephemeral());
        assert!(NodeKind::EphemeralSequential.is_sequential());
        assert!(!NodeKind::Ephemeral.is_sequential());
    }
}
