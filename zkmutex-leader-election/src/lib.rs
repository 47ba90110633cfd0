//! ZooKeeper based mutual exclusion for cooperating processes.
//!
//! This crate provides the building blocks that let any number of processes
//! sharing a sync group agree on which one of them may run a job. The
//! participant owning the smallest ephemeral sequential ballot under the lock
//! path holds the lock; everybody else waits for the ballot set to change.
//!
//! # Overview
//!
//! - **Coordinator seam**: [`Coordinator`] abstracts the service primitives
//! - **ZooKeeper backend**: [`ZkSession`] opens a session from a [`ConnectString`]
//! - **In-memory backend**: [`MemoryEnsemble`] for tests and local simulations
//! - **Setup helpers**: [`ensure_hierarchy`] and [`mark_membership`]
//! - **Election engine**: [`Election`] reports an [`ElectionOutcome`] exactly once
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zkmutex_leader_election::{
//!     ensure_hierarchy, ConnectString, Election, ElectionOutcome, JobPaths, ZkSession,
//!     DEFAULT_SESSION_TIMEOUT,
//! };
//!
//! let address = ConnectString::parse("zk1:2181,zk2:2181/jobs")?;
//! let session = Arc::new(ZkSession::connect(&address, DEFAULT_SESSION_TIMEOUT).await?);
//! let paths = JobPaths::new("nightly-backup");
//! ensure_hierarchy(session.as_ref(), &paths.lock(), true).await?;
//!
//! match Election::new(session, paths.lock()).spawn().outcome().await {
//!     ElectionOutcome::Acquired(leadership) => {
//!         // We hold the lock until the ballot goes away
//!         println!("Won with {}", leadership.ballot());
//!     }
//!     ElectionOutcome::Failed(e) => eprintln!("Election failed: {}", e),
//! }
//! ```

mod coordinator;
mod election;
mod error;
mod hierarchy;
mod memory;
mod paths;
mod zookeeper;

pub use coordinator::{
    join_path, node_name, ChangeEvent, ChangeWatch, ConnectString, Coordinator, NodeKind,
};
pub use election::{
    is_ballot, sorted_ballots, Election, ElectionHandle, ElectionOutcome, Leadership, LockLoss,
    BALLOT_PREFIX, SEQUENCE_WIDTH,
};
pub use error::{CoordinationError, ElectionError, Result};
pub use hierarchy::{ensure_hierarchy, local_hostname, mark_membership};
pub use memory::{MemoryCoordinator, MemoryEnsemble};
pub use paths::JobPaths;
pub use zookeeper::{ZkSession, CONNECT_TIMEOUT, DEFAULT_SESSION_TIMEOUT};
