//! Ballot based leader election
//!
//! Every participant creates an ephemeral sequential ballot under the lock
//! path. The participant owning the smallest ballot holds the lock; everybody
//! else watches the lock path and re-evaluates on every change. Ballots of
//! departed participants are removed by the coordination service, so the next
//! listing after a departure already reflects the new winner.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::coordinator::{join_path, node_name, ChangeEvent, Coordinator, NodeKind};
use crate::error::{CoordinationError, ElectionError};
use crate::hierarchy::local_hostname;

/// Name prefix of every ballot
pub const BALLOT_PREFIX: &str = "ballot-";

/// Width of the zero padded sequence suffix assigned by ZooKeeper (`%010d`)
///
/// Lexicographic order of ballot names equals creation order only because
/// every suffix has exactly this width.
pub const SEQUENCE_WIDTH: usize = 10;

/// Whether a child of the lock path is a well formed ballot
pub fn is_ballot(name: &str) -> bool {
    name.strip_prefix(BALLOT_PREFIX).is_some_and(|suffix| {
        suffix.len() == SEQUENCE_WIDTH && suffix.bytes().all(|b| b.is_ascii_digit())
    })
}

/// Ballots among `children`, in creation order
pub fn sorted_ballots(children: Vec<String>) -> Vec<String> {
    let mut ballots: Vec<String> = children.into_iter().filter(|c| is_ballot(c)).collect();
    ballots.sort();
    ballots
}

/// Result of one election attempt
#[derive(Debug)]
pub enum ElectionOutcome {
    /// This participant owns the smallest ballot
    Acquired(Leadership),
    /// The attempt ended on an unrecoverable error
    Failed(ElectionError),
}

/// One election attempt against a lock path
pub struct Election {
    coordinator: Arc<dyn Coordinator>,
    lock_path: String,
}

impl Election {
    /// Prepare an attempt; the lock path must already exist
    pub fn new(coordinator: Arc<dyn Coordinator>, lock_path: impl Into<String>) -> Self {
        Self {
            coordinator,
            lock_path: lock_path.into(),
        }
    }

    /// Run the attempt on its own task
    pub fn spawn(self) -> ElectionHandle {
        ElectionHandle {
            handle: tokio::spawn(self.run()),
        }
    }

    async fn run(self) -> Result<Leadership, ElectionError> {
        let hostname = local_hostname()?;

        let prefix = join_path(&self.lock_path, BALLOT_PREFIX);
        let created = self
            .coordinator
            .create(&prefix, hostname.as_bytes(), NodeKind::EphemeralSequential)
            .await
            .map_err(|source| self.ballot_error(source))?;
        let ballot = node_name(&created).to_string();
        tracing::info!("Running leader election with ballot {}", ballot);

        loop {
            let (children, watch) = self
                .coordinator
                .children_with_watch(&self.lock_path)
                .await
                .map_err(|source| self.children_error(source))?;

            let ballots = sorted_ballots(children);
            if !ballots.contains(&ballot) {
                return Err(ElectionError::BallotVanished(ballot));
            }
            if ballots[0] == ballot {
                tracing::info!("Ballot {} won the leader election", ballot);
                return Ok(Leadership {
                    coordinator: self.coordinator,
                    lock_path: self.lock_path,
                    ballot,
                });
            }
            tracing::info!("Ballot {} won the leader election", ballots[0]);

            if watch.changed().await == ChangeEvent::SessionLost {
                return Err(ElectionError::SessionLost);
            }
            tracing::debug!("Ballots under {} changed, re-evaluating", self.lock_path);
        }
    }

    fn ballot_error(&self, source: CoordinationError) -> ElectionError {
        if source == CoordinationError::SessionLost {
            return ElectionError::SessionLost;
        }
        ElectionError::BallotCreation {
            lock_path: self.lock_path.clone(),
            source,
        }
    }

    fn children_error(&self, source: CoordinationError) -> ElectionError {
        if source == CoordinationError::SessionLost {
            return ElectionError::SessionLost;
        }
        ElectionError::Children {
            lock_path: self.lock_path.clone(),
            source,
        }
    }
}

/// The pending result of a spawned election
///
/// Consumed by [`ElectionHandle::outcome`], so the result is observed exactly
/// once.
pub struct ElectionHandle {
    handle: JoinHandle<Result<Leadership, ElectionError>>,
}

impl ElectionHandle {
    /// Wait until the election is won or has failed
    pub async fn outcome(self) -> ElectionOutcome {
        match self.handle.await {
            Ok(Ok(leadership)) => ElectionOutcome::Acquired(leadership),
            Ok(Err(e)) => ElectionOutcome::Failed(e),
            Err(e) => ElectionOutcome::Failed(ElectionError::Task(e.to_string())),
        }
    }

    /// Whether the election already reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Why a held lock stopped being held
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockLoss {
    /// The ballot node disappeared
    BallotRemoved,
    /// The coordination session ended
    SessionLost,
    /// The ballot could no longer be observed
    Unobservable(CoordinationError),
}

/// A won election
///
/// The lock is held for as long as the ballot exists.
pub struct Leadership {
    coordinator: Arc<dyn Coordinator>,
    lock_path: String,
    ballot: String,
}

impl std::fmt::Debug for Leadership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Leadership")
            .field("lock_path", &self.lock_path)
            .field("ballot", &self.ballot)
            .finish()
    }
}

impl Leadership {
    /// Name of the winning ballot
    pub fn ballot(&self) -> &str {
        &self.ballot
    }

    /// Full path of the winning ballot
    pub fn ballot_path(&self) -> String {
        join_path(&self.lock_path, &self.ballot)
    }

    /// Resolve once the lock is no longer held
    pub async fn lost(&self) -> LockLoss {
        let path = self.ballot_path();
        loop {
            let (exists, watch) = match self.coordinator.exists_with_watch(&path).await {
                Ok(found) => found,
                Err(CoordinationError::SessionLost) => return LockLoss::SessionLost,
                Err(e) => return LockLoss::Unobservable(e),
            };
            if !exists {
                return LockLoss::BallotRemoved;
            }

            match watch.changed().await {
                ChangeEvent::Deleted => return LockLoss::BallotRemoved,
                ChangeEvent::SessionLost => return LockLoss::SessionLost,
                _ => continue,
            }
        }
    }

    /// Give up the lock by deleting the ballot
    pub async fn release(self) -> Result<(), CoordinationError> {
        let path = self.ballot_path();
        match self.coordinator.delete(&path).await {
            Ok(()) | Err(CoordinationError::NoNode(_)) => {
                tracing::info!("Released ballot {}", self.ballot);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
