//! In-process coordinator
//!
//! A [`MemoryEnsemble`] holds one shared node tree. Every
//! [`MemoryEnsemble::session`] call hands out a [`MemoryCoordinator`] with its
//! own session id; closing that session deletes the ephemeral nodes it owns and
//! fires the affected watches, the same way a real ensemble does on session
//! expiry. Children are returned in no particular order.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::oneshot;

use crate::coordinator::{ChangeEvent, ChangeWatch, Coordinator, NodeKind};
use crate::error::{CoordinationError, Result};

type SessionId = u64;

#[derive(Debug, Default)]
struct Node {
    data: Vec<u8>,
    owner: Option<SessionId>,
    children: HashSet<String>,
}

struct Watch {
    session: SessionId,
    tx: oneshot::Sender<ChangeEvent>,
}

#[derive(Default)]
struct Tree {
    nodes: HashMap<String, Node>,
    sequences: HashMap<String, u64>,
    child_watches: HashMap<String, Vec<Watch>>,
    node_watches: HashMap<String, Vec<Watch>>,
    live_sessions: HashSet<SessionId>,
    next_session: SessionId,
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "/",
    }
}

fn fire(watches: Option<Vec<Watch>>, event: ChangeEvent) {
    for watch in watches.into_iter().flatten() {
        let _ = watch.tx.send(event);
    }
}

impl Tree {
    fn new() -> Self {
        let mut tree = Self::default();
        tree.nodes.insert("/".to_string(), Node::default());
        tree
    }

    fn check_session(&self, session: SessionId) -> Result<()> {
        if self.live_sessions.contains(&session) {
            Ok(())
        } else {
            Err(CoordinationError::SessionLost)
        }
    }

    fn watch(
        map: &mut HashMap<String, Vec<Watch>>,
        path: &str,
        session: SessionId,
    ) -> ChangeWatch {
        let (tx, rx) = oneshot::channel();
        map.entry(path.to_string())
            .or_default()
            .push(Watch { session, tx });
        ChangeWatch::new(
            rx.map(|event| event.unwrap_or(ChangeEvent::SessionLost))
                .boxed(),
        )
    }

    fn create(
        &mut self,
        session: SessionId,
        path: &str,
        data: &[u8],
        kind: NodeKind,
    ) -> Result<String> {
        let parent = parent_of(path).to_string();
        if !self.nodes.contains_key(&parent) {
            return Err(CoordinationError::NoNode(parent));
        }

        let path = if kind.is_sequential() {
            let counter = self.sequences.entry(parent.clone()).or_insert(0);
            let created = format!("{}{:010}", path, *counter);
            *counter += 1;
            created
        } else {
            path.to_string()
        };
        if self.nodes.contains_key(&path) {
            return Err(CoordinationError::NodeExists(path));
        }

        let name = path[parent.len()..].trim_start_matches('/').to_string();
        self.nodes.insert(
            path.clone(),
            Node {
                data: data.to_vec(),
                owner: kind.is_ephemeral().then_some(session),
                children: HashSet::new(),
            },
        );
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.insert(name);
        }

        fire(self.node_watches.remove(&path), ChangeEvent::Created);
        fire(self.child_watches.remove(&parent), ChangeEvent::ChildrenChanged);
        Ok(path)
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?;
        if !node.children.is_empty() {
            return Err(CoordinationError::Request {
                path: path.to_string(),
                message: "node has children".to_string(),
            });
        }

        self.nodes.remove(path);
        let parent = parent_of(path).to_string();
        if let Some(node) = self.nodes.get_mut(&parent) {
            let name = path[parent.len()..].trim_start_matches('/');
            node.children.remove(name);
        }

        fire(self.node_watches.remove(path), ChangeEvent::Deleted);
        fire(self.child_watches.remove(path), ChangeEvent::Deleted);
        fire(self.child_watches.remove(&parent), ChangeEvent::ChildrenChanged);
        Ok(())
    }

    fn close_session(&mut self, session: SessionId) {
        if !self.live_sessions.remove(&session) {
            return;
        }

        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.owner == Some(session))
            .map(|(path, _)| path.clone())
            .collect();
        for path in owned {
            let _ = self.remove(&path);
        }

        for watches in self
            .child_watches
            .values_mut()
            .chain(self.node_watches.values_mut())
        {
            let (lost, kept): (Vec<Watch>, Vec<Watch>) =
                watches.drain(..).partition(|w| w.session == session);
            *watches = kept;
            fire(Some(lost), ChangeEvent::SessionLost);
        }
    }
}

/// A shared in-memory node tree standing in for an ensemble
#[derive(Clone)]
pub struct MemoryEnsemble {
    tree: Arc<Mutex<Tree>>,
}

impl MemoryEnsemble {
    /// Create an ensemble holding only the root node
    pub fn new() -> Self {
        Self {
            tree: Arc::new(Mutex::new(Tree::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a new session against the ensemble
    pub fn session(&self) -> MemoryCoordinator {
        let mut tree = self.lock();
        tree.next_session += 1;
        let id = tree.next_session;
        tree.live_sessions.insert(id);
        MemoryCoordinator {
            ensemble: self.clone(),
            session: id,
        }
    }

    /// Whether a node exists
    pub fn exists(&self, path: &str) -> bool {
        self.lock().nodes.contains_key(path)
    }

    /// Content of a node
    pub fn data(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().nodes.get(path).map(|node| node.data.clone())
    }

    /// Sorted children of a node
    pub fn children(&self, path: &str) -> Vec<String> {
        let mut children: Vec<String> = self
            .lock()
            .nodes
            .get(path)
            .map(|node| node.children.iter().cloned().collect())
            .unwrap_or_default();
        children.sort();
        children
    }

    /// Delete a node from outside any session
    pub fn delete(&self, path: &str) -> Result<()> {
        self.lock().remove(path)
    }
}

impl Default for MemoryEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

/// One session on a [`MemoryEnsemble`]
pub struct MemoryCoordinator {
    ensemble: MemoryEnsemble,
    session: SessionId,
}

impl MemoryCoordinator {
    /// End the session, deleting its ephemeral nodes
    pub fn close(&self) {
        self.ensemble.lock().close_session(self.session);
    }

    /// Whether the session is still alive
    pub fn is_alive(&self) -> bool {
        self.ensemble.lock().live_sessions.contains(&self.session)
    }

    /// The ensemble this session belongs to
    pub fn ensemble(&self) -> &MemoryEnsemble {
        &self.ensemble
    }
}

impl Drop for MemoryCoordinator {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    async fn create(&self, path: &str, data: &[u8], kind: NodeKind) -> Result<String> {
        let mut tree = self.ensemble.lock();
        tree.check_session(self.session)?;
        tree.create(self.session, path, data, kind)
    }

    async fn children_with_watch(&self, path: &str) -> Result<(Vec<String>, ChangeWatch)> {
        let mut tree = self.ensemble.lock();
        tree.check_session(self.session)?;
        let children: Vec<String> = tree
            .nodes
            .get(path)
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?
            .children
            .iter()
            .cloned()
            .collect();
        let watch = Tree::watch(&mut tree.child_watches, path, self.session);
        Ok((children, watch))
    }

    async fn exists_with_watch(&self, path: &str) -> Result<(bool, ChangeWatch)> {
        let mut tree = self.ensemble.lock();
        tree.check_session(self.session)?;
        let exists = tree.nodes.contains_key(path);
        let watch = Tree::watch(&mut tree.node_watches, path, self.session);
        Ok((exists, watch))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut tree = self.ensemble.lock();
        tree.check_session(self.session)?;
        tree.remove(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::join_path;

    #[tokio::test]
    async fn test_sequential_names_are_zero_padded() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.session();
        session
            .create("/lock", b"", NodeKind::Persistent)
            .await
            .unwrap();

        let first = session
            .create("/lock/ballot-", b"", NodeKind::EphemeralSequential)
            .await
            .unwrap();
        let second = session
            .create("/lock/ballot-", b"", NodeKind::EphemeralSequential)
            .await
            .unwrap();

        assert_eq!(first, "/lock/ballot-0000000000");
        assert_eq!(second, "/lock/ballot-0000000001");
    }

    #[tokio::test]
    async fn test_create_requires_parent() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.session();

        let result = session.create("/a/b", b"", NodeKind::Persistent).await;
        assert_eq!(result, Err(CoordinationError::NoNode("/a".to_string())));
    }

    #[tokio::test]
    async fn test_close_removes_ephemerals_and_fires_watch() {
        let ensemble = MemoryEnsemble::new();
        let owner = ensemble.session();
        let observer = ensemble.session();

        owner
            .create("/group", b"", NodeKind::Persistent)
            .await
            .unwrap();
        owner
            .create("/group/member", b"host", NodeKind::Ephemeral)
            .await
            .unwrap();

        let (children, watch) = observer.children_with_watch("/group").await.unwrap();
        assert_eq!(children, vec!["member".to_string()]);

        owner.close();
        assert_eq!(watch.changed().await, ChangeEvent::ChildrenChanged);
        assert!(!ensemble.exists("/group/member"));
        assert!(ensemble.exists("/group"));
    }

    #[tokio::test]
    async fn test_closed_session_rejects_requests() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.session();
        let (_, watch) = session.exists_with_watch("/missing").await.unwrap();

        session.close();
        assert!(!session.is_alive());
        assert_eq!(watch.changed().await, ChangeEvent::SessionLost);
        assert_eq!(
            session.create("/x", b"", NodeKind::Persistent).await,
            Err(CoordinationError::SessionLost)
        );
    }

    #[tokio::test]
    async fn test_delete_non_empty_node_fails() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.session();
        session.create("/a", b"", NodeKind::Persistent).await.unwrap();
        session
            .create(&join_path("/a", "b"), b"", NodeKind::Persistent)
            .await
            .unwrap();

        assert!(matches!(
            session.delete("/a").await,
            Err(CoordinationError::Request { .. })
        ));
        session.delete("/a/b").await.unwrap();
        session.delete("/a").await.unwrap();
        assert!(!ensemble.exists("/a"));
    }
}
