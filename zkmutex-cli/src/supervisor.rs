//! The election / job / policy loop
//!
//! A [`Supervisor`] prepares the sync group hierarchy, then repeatedly wins
//! the lock, runs the job while racing the loss of the lock, and asks the
//! [`PolicyController`] what to do next. At most one election task is alive
//! at any time.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use zkmutex_common::{ErrorSeverity, Severity};
use zkmutex_config::JobSpec;
use zkmutex_leader_election::{
    ensure_hierarchy, local_hostname, mark_membership, CoordinationError, Coordinator, Election,
    ElectionError, ElectionOutcome, JobPaths, Leadership, LockLoss,
};

use crate::job::{JobError, JobOutcome, JobRunner};
use crate::policy::{Decision, PolicyController, PolicyEvent};

/// Pause before a new election after a failed one
pub const ELECTION_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to create lock path {path}")]
    Hierarchy {
        path: String,
        #[source]
        source: CoordinationError,
    },

    #[error("Coordination session lost")]
    SessionLost,
}

impl Severity for SupervisorError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Critical
    }
}

/// Everything one participant works with
pub struct SupervisorContext {
    pub coordinator: Arc<dyn Coordinator>,
    pub paths: JobPaths,
    pub job: JobSpec,
}

struct Attempt {
    event: PolicyEvent,
    session_lost: bool,
}

impl Attempt {
    fn new(event: PolicyEvent) -> Self {
        Self {
            event,
            session_lost: false,
        }
    }

    fn without_session(event: PolicyEvent) -> Self {
        Self {
            event,
            session_lost: true,
        }
    }
}

enum Race {
    Finished(Result<JobOutcome, JobError>),
    Lost(LockLoss),
}

pub struct Supervisor<R> {
    context: SupervisorContext,
    runner: R,
    controller: PolicyController,
    retry_delay: Duration,
}

impl<R: JobRunner> Supervisor<R> {
    pub fn new(context: SupervisorContext, runner: R) -> Self {
        let controller = PolicyController::new(context.job.exit_policy);
        Self {
            context,
            runner,
            controller,
            retry_delay: ELECTION_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Run until the policy says to stop; returns the process exit code
    pub async fn run(&self) -> Result<i32, SupervisorError> {
        self.prepare().await?;

        loop {
            let attempt = self.attempt().await;
            match self.controller.decide(attempt.event) {
                Decision::Exit(code) => {
                    info!(
                        "Exiting with {} after {:?} under policy {}",
                        code,
                        attempt.event,
                        self.controller.policy()
                    );
                    return Ok(code);
                }
                Decision::Reelect if attempt.session_lost => {
                    return Err(SupervisorError::SessionLost);
                }
                Decision::Reelect => {
                    if attempt.event == PolicyEvent::ElectionFailed {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    debug!("Re-entering election for job {}", self.context.job.name);
                }
            }
        }
    }

    /// Create the lock path and register the membership marker
    pub async fn prepare(&self) -> Result<(), SupervisorError> {
        let coordinator = self.context.coordinator.as_ref();
        let lock_path = self.context.paths.lock();

        ensure_hierarchy(coordinator, &lock_path, true)
            .await
            .map_err(|source| SupervisorError::Hierarchy {
                path: lock_path.clone(),
                source,
            })?;

        if let Err(e) = self.register_member(coordinator).await {
            warn!("Membership marker not created: {}", e);
        }
        Ok(())
    }

    async fn register_member(&self, coordinator: &dyn Coordinator) -> Result<(), String> {
        let hostname = local_hostname().map_err(|e| e.to_string())?;
        ensure_hierarchy(coordinator, &self.context.paths.members(), true)
            .await
            .map_err(|e| e.to_string())?;
        mark_membership(coordinator, &self.context.paths.member(&hostname))
            .await
            .map_err(|e| e.to_string())
    }

    async fn attempt(&self) -> Attempt {
        let job = &self.context.job;
        let election = Election::new(self.context.coordinator.clone(), self.context.paths.lock());

        let leadership = match election.spawn().outcome().await {
            ElectionOutcome::Acquired(leadership) => leadership,
            ElectionOutcome::Failed(ElectionError::SessionLost) => {
                error!("Election for job {} failed: session lost", job.name);
                return Attempt::without_session(PolicyEvent::ElectionFailed);
            }
            ElectionOutcome::Failed(e) => {
                error!("Election for job {} failed: {}", job.name, e);
                return Attempt::new(PolicyEvent::ElectionFailed);
            }
        };
        info!(
            "Acquired lock {} for job {}",
            leadership.ballot_path(),
            job.name
        );

        self.run_job(leadership).await
    }

    async fn run_job(&self, leadership: Leadership) -> Attempt {
        let job = &self.context.job;
        let (stop_tx, stop_rx) = oneshot::channel();
        let run = self.runner.run(job, stop_rx);
        tokio::pin!(run);

        let race = tokio::select! {
            result = &mut run => Race::Finished(result),
            loss = leadership.lost() => Race::Lost(loss),
        };

        let (event, loss) = match race {
            Race::Finished(result) => {
                log_job_result(&job.name, &result);
                (PolicyEvent::JobFinished, None)
            }
            Race::Lost(loss) => {
                warn!("Lost lock for job {}: {:?}", job.name, loss);
                let _ = stop_tx.send(());
                log_job_result(&job.name, &run.await);
                (PolicyEvent::LockLost, Some(loss))
            }
        };

        if matches!(loss, Some(LockLoss::SessionLost)) {
            return Attempt::without_session(event);
        }
        match leadership.release().await {
            Ok(()) => Attempt::new(event),
            Err(CoordinationError::SessionLost) => Attempt::without_session(event),
            Err(e) => {
                warn!("Failed to release lock for job {}: {}", job.name, e);
                Attempt::new(event)
            }
        }
    }
}

fn log_job_result(name: &str, result: &Result<JobOutcome, JobError>) {
    match result {
        Ok(outcome) => debug!("Job {} ended: {:?}", name, outcome),
        Err(e) => error!("Job {} could not run: {}", name, e),
    }
}
