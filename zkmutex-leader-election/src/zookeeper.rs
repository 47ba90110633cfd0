//! ZooKeeper backed coordinator
//!
//! Wraps a `zookeeper-client` session. Paths passed in are relative to the
//! chroot given in the connect string; the client applies the chroot itself.

use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use zookeeper_client as zk;

use crate::coordinator::{ChangeEvent, ChangeWatch, ConnectString, Coordinator, NodeKind};
use crate::error::{CoordinationError, Result};

/// Fixed timeout for establishing the session
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(6);

/// Session timeout used when none is configured
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// A live ZooKeeper session
#[derive(Clone)]
pub struct ZkSession {
    client: zk::Client,
    address: ConnectString,
}

impl ZkSession {
    /// Open a session to the ensemble
    pub async fn connect(address: &ConnectString, session_timeout: Duration) -> Result<Self> {
        tracing::debug!(
            "Connecting to {} (chroot {})",
            address.servers().join(","),
            address.chroot()
        );

        let client = zk::Client::connector()
            .connection_timeout(CONNECT_TIMEOUT)
            .session_timeout(session_timeout)
            .connect(&address.to_string())
            .await
            .map_err(|e| CoordinationError::Connect {
                servers: address.servers().join(","),
                message: e.to_string(),
            })?;

        tracing::info!("Connected to coordination service {}", address);
        Ok(Self {
            client,
            address: address.clone(),
        })
    }

    /// The address this session was opened with
    pub fn address(&self) -> &ConnectString {
        &self.address
    }
}

fn map_error(path: &str, error: zk::Error) -> CoordinationError {
    match error {
        zk::Error::NodeExists => CoordinationError::NodeExists(path.to_string()),
        zk::Error::NoNode => CoordinationError::NoNode(path.to_string()),
        zk::Error::SessionExpired | zk::Error::ClientClosed => CoordinationError::SessionLost,
        other => CoordinationError::Request {
            path: path.to_string(),
            message: other.to_string(),
        },
    }
}

fn map_event(event: &zk::WatchedEvent) -> ChangeEvent {
    match event.event_type {
        zk::EventType::NodeChildrenChanged => ChangeEvent::ChildrenChanged,
        zk::EventType::NodeCreated => ChangeEvent::Created,
        zk::EventType::NodeDeleted => ChangeEvent::Deleted,
        zk::EventType::NodeDataChanged => ChangeEvent::DataChanged,
        _ => ChangeEvent::SessionLost,
    }
}

fn into_change_watch(watcher: zk::OneshotWatcher) -> ChangeWatch {
    ChangeWatch::new(
        async move {
            let event = watcher.changed().await;
            map_event(&event)
        }
        .boxed(),
    )
}

#[async_trait]
impl Coordinator for ZkSession {
    async fn create(&self, path: &str, data: &[u8], kind: NodeKind) -> Result<String> {
        let mode = match kind {
            NodeKind::Persistent => zk::CreateMode::Persistent,
            NodeKind::Ephemeral => zk::CreateMode::Ephemeral,
            NodeKind::EphemeralSequential => zk::CreateMode::EphemeralSequential,
        };
        let options = mode.with_acls(zk::Acls::anyone_all());

        let (_, sequence) = self
            .client
            .create(path, data, &options)
            .await
            .map_err(|e| map_error(path, e))?;

        if kind.is_sequential() {
            // The service pads the suffix to ten digits
            Ok(format!("{}{}", path, sequence))
        } else {
            Ok(path.to_string())
        }
    }

    async fn children_with_watch(&self, path: &str) -> Result<(Vec<String>, ChangeWatch)> {
        let (children, watcher) = self
            .client
            .list_and_watch_children(path)
            .await
            .map_err(|e| map_error(path, e))?;
        Ok((children, into_change_watch(watcher)))
    }

    async fn exists_with_watch(&self, path: &str) -> Result<(bool, ChangeWatch)> {
        let (stat, watcher) = self
            .client
            .check_and_watch_stat(path)
            .await
            .map_err(|e| map_error(path, e))?;
        Ok((stat.is_some(), into_change_watch(watcher)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.client
            .delete(path, None)
            .await
            .map_err(|e| map_error(path, e))
    }
}
