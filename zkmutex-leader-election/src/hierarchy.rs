//! Node hierarchy setup and membership markers

use crate::coordinator::{Coordinator, NodeKind};
use crate::error::{CoordinationError, ElectionError, Result};

/// Name of this host, used as node content for observability
pub fn local_hostname() -> std::result::Result<String, ElectionError> {
    nix::unistd::gethostname()
        .map_err(|e| ElectionError::Hostname(e.to_string()))
        .map(|name| name.to_string_lossy().into_owned())
}

/// Create every missing node along `path`
///
/// Prefixes are created from the root towards the leaf; the root itself is
/// assumed to exist. With `exists_ok` a node that is already there is skipped,
/// which lets several participants race on the same hierarchy. Any other
/// failure stops the walk and is returned.
pub async fn ensure_hierarchy(
    coordinator: &dyn Coordinator,
    path: &str,
    exists_ok: bool,
) -> Result<()> {
    let mut prefix = String::new();

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        prefix.push('/');
        prefix.push_str(segment);

        match coordinator.create(&prefix, &[], NodeKind::Persistent).await {
            Ok(created) => tracing::info!("Created node {}", created),
            Err(CoordinationError::NodeExists(_)) if exists_ok => {
                tracing::trace!("Node {} already exists", prefix);
            }
            Err(e) => {
                tracing::error!("Failed to create node {}: {}", prefix, e);
                return Err(e);
            }
        }
    }

    Ok(())
}

/// Announce this participant with an ephemeral node holding the hostname
///
/// The marker only serves observability; callers usually log a failure and
/// carry on.
pub async fn mark_membership(coordinator: &dyn Coordinator, path: &str) -> Result<()> {
    let hostname = local_hostname().map_err(|e| CoordinationError::Request {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    coordinator
        .create(path, hostname.as_bytes(), NodeKind::Ephemeral)
        .await?;
    tracing::debug!("Registered membership marker {}", path);
    Ok(())
}
