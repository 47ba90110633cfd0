//! Integration tests for the election / job / policy loop
//!
//! Supervisors run against an in-memory ensemble with a scripted job runner
//! that records how often and how concurrently it was invoked.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use zkmutex_cli::exit_codes::EXIT_SUCCESS;
use zkmutex_cli::job::{JobError, JobOutcome, JobRunner};
use zkmutex_cli::supervisor::{Supervisor, SupervisorContext, SupervisorError};
use zkmutex_config::{ExitPolicy, JobSpec};
use zkmutex_leader_election::{
    local_hostname, ChangeWatch, Coordinator, JobPaths, MemoryCoordinator, MemoryEnsemble,
    NodeKind,
};

// =============================================================================
// Test Helpers
// =============================================================================

const SYNC_GROUP: &str = "nightly";

#[derive(Default)]
struct Counters {
    runs: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    stopped: AtomicUsize,
}

/// Job runner that either holds the lock for a while or until stopped
#[derive(Clone)]
struct ScriptedRunner {
    counters: Arc<Counters>,
    hold: Option<Duration>,
}

impl ScriptedRunner {
    fn holding_for(hold: Duration) -> Self {
        Self {
            counters: Arc::default(),
            hold: Some(hold),
        }
    }

    fn until_stopped() -> Self {
        Self {
            counters: Arc::default(),
            hold: None,
        }
    }

    fn runs(&self) -> usize {
        self.counters.runs.load(Ordering::SeqCst)
    }

    fn stopped(&self) -> usize {
        self.counters.stopped.load(Ordering::SeqCst)
    }

    fn max_active(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobRunner for ScriptedRunner {
    async fn run(
        &self,
        _job: &JobSpec,
        stop: oneshot::Receiver<()>,
    ) -> Result<JobOutcome, JobError> {
        let counters = &self.counters;
        counters.runs.fetch_add(1, Ordering::SeqCst);
        let active = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_active.fetch_max(active, Ordering::SeqCst);

        let outcome = match self.hold {
            Some(hold) => tokio::select! {
                _ = tokio::time::sleep(hold) => JobOutcome::Exited { code: Some(0), success: true },
                _ = stop => JobOutcome::Stopped,
            },
            None => {
                let _ = stop.await;
                JobOutcome::Stopped
            }
        };
        if outcome == JobOutcome::Stopped {
            counters.stopped.fetch_add(1, Ordering::SeqCst);
        }

        counters.active.fetch_sub(1, Ordering::SeqCst);
        Ok(outcome)
    }
}

/// Session that expires right before its next ballot is created
struct ExpiringSession {
    inner: Arc<MemoryCoordinator>,
    ballot_attempts: AtomicUsize,
}

#[async_trait]
impl Coordinator for ExpiringSession {
    async fn create(
        &self,
        path: &str,
        data: &[u8],
        kind: NodeKind,
    ) -> zkmutex_leader_election::Result<String> {
        if kind == NodeKind::EphemeralSequential {
            self.ballot_attempts.fetch_add(1, Ordering::SeqCst);
            self.inner.close();
        }
        self.inner.create(path, data, kind).await
    }

    async fn children_with_watch(
        &self,
        path: &str,
    ) -> zkmutex_leader_election::Result<(Vec<String>, ChangeWatch)> {
        self.inner.children_with_watch(path).await
    }

    async fn exists_with_watch(
        &self,
        path: &str,
    ) -> zkmutex_leader_election::Result<(bool, ChangeWatch)> {
        self.inner.exists_with_watch(path).await
    }

    async fn delete(&self, path: &str) -> zkmutex_leader_election::Result<()> {
        self.inner.delete(path).await
    }
}

fn job(policy: ExitPolicy) -> JobSpec {
    JobSpec {
        name: "backup".to_string(),
        command: vec!["/usr/bin/backup".to_string()],
        exit_policy: policy,
        success_delay: Duration::ZERO,
    }
}

fn supervisor(
    session: &Arc<MemoryCoordinator>,
    policy: ExitPolicy,
    runner: ScriptedRunner,
) -> Supervisor<ScriptedRunner> {
    let coordinator: Arc<dyn Coordinator> = session.clone();
    let context = SupervisorContext {
        coordinator,
        paths: JobPaths::new(SYNC_GROUP),
        job: job(policy),
    };
    Supervisor::new(context, runner).with_retry_delay(Duration::from_millis(10))
}

/// Poll `condition` until it holds, failing the test after five seconds
async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn remove_current_ballot(ensemble: &MemoryEnsemble) {
    let lock_path = JobPaths::new(SYNC_GROUP).lock();
    let ballots = ensemble.children(&lock_path);
    let first = ballots.first().expect("no ballot to remove");
    ensemble
        .delete(&format!("{}/{}", lock_path, first))
        .unwrap();
}

// =============================================================================
// Policy behavior
// =============================================================================

#[test_log::test(tokio::test)]
async fn test_run_command_runs_once_then_exits() {
    let ensemble = MemoryEnsemble::new();
    let session = Arc::new(ensemble.session());
    let runner = ScriptedRunner::holding_for(Duration::from_millis(20));

    let code = supervisor(&session, ExitPolicy::RunCommand, runner.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(runner.runs(), 1);
    // The ballot is released once the run is over
    assert!(ensemble.children(&JobPaths::new(SYNC_GROUP).lock()).is_empty());
}

#[test_log::test(tokio::test)]
async fn test_reacquire_lock_reelects_after_lock_loss() {
    let ensemble = MemoryEnsemble::new();
    let session = Arc::new(ensemble.session());
    let runner = ScriptedRunner::until_stopped();

    let task = {
        let supervisor = supervisor(&session, ExitPolicy::ReacquireLock, runner.clone());
        tokio::spawn(async move { supervisor.run().await })
    };

    wait_until("first run", || runner.runs() == 1).await;
    remove_current_ballot(&ensemble);

    wait_until("second run", || runner.runs() == 2).await;
    assert_eq!(runner.stopped(), 1);
    assert!(!task.is_finished());

    task.abort();
}

#[test_log::test(tokio::test)]
async fn test_reacquire_lock_reelects_after_job_finishes() {
    let ensemble = MemoryEnsemble::new();
    let session = Arc::new(ensemble.session());
    let runner = ScriptedRunner::holding_for(Duration::from_millis(10));

    let task = {
        let supervisor = supervisor(&session, ExitPolicy::ReacquireLock, runner.clone());
        tokio::spawn(async move { supervisor.run().await })
    };

    wait_until("three runs", || runner.runs() >= 3).await;
    assert_eq!(runner.stopped(), 0);

    task.abort();
}

#[test_log::test(tokio::test)]
async fn test_terminate_exits_on_lock_loss() {
    let ensemble = MemoryEnsemble::new();
    let session = Arc::new(ensemble.session());
    let runner = ScriptedRunner::until_stopped();

    let task = {
        let supervisor = supervisor(&session, ExitPolicy::Terminate, runner.clone());
        tokio::spawn(async move { supervisor.run().await })
    };

    wait_until("first run", || runner.runs() == 1).await;
    remove_current_ballot(&ensemble);

    let code = task.await.unwrap().unwrap();
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(runner.runs(), 1);
    assert_eq!(runner.stopped(), 1);
}

#[test_log::test(tokio::test)]
async fn test_session_loss_is_fatal_when_reelecting() {
    let ensemble = MemoryEnsemble::new();
    let session = Arc::new(ensemble.session());
    let runner = ScriptedRunner::until_stopped();

    let task = {
        let supervisor = supervisor(&session, ExitPolicy::ReacquireLock, runner.clone());
        tokio::spawn(async move { supervisor.run().await })
    };

    wait_until("first run", || runner.runs() == 1).await;
    session.close();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("supervisor kept running without a session")
        .unwrap();
    assert!(matches!(result, Err(SupervisorError::SessionLost)));
    assert_eq!(runner.runs(), 1);
}

#[test_log::test(tokio::test)]
async fn test_session_loss_before_ballot_creation_is_fatal() {
    let ensemble = MemoryEnsemble::new();
    let session = Arc::new(ExpiringSession {
        inner: Arc::new(ensemble.session()),
        ballot_attempts: AtomicUsize::new(0),
    });
    let runner = ScriptedRunner::until_stopped();

    let coordinator: Arc<dyn Coordinator> = session.clone();
    let context = SupervisorContext {
        coordinator,
        paths: JobPaths::new(SYNC_GROUP),
        job: job(ExitPolicy::ReacquireLock),
    };
    let supervisor =
        Supervisor::new(context, runner.clone()).with_retry_delay(Duration::from_millis(10));

    let result = tokio::time::timeout(Duration::from_secs(2), supervisor.run())
        .await
        .expect("supervisor kept retrying without a session");
    assert!(matches!(result, Err(SupervisorError::SessionLost)));
    assert_eq!(session.ballot_attempts.load(Ordering::SeqCst), 1);
    assert_eq!(runner.runs(), 0);
}

// =============================================================================
// Setup
// =============================================================================

#[test_log::test(tokio::test)]
async fn test_setup_failure_is_fatal() {
    let ensemble = MemoryEnsemble::new();
    let session = Arc::new(ensemble.session());
    session.close();
    let runner = ScriptedRunner::until_stopped();

    let result = supervisor(&session, ExitPolicy::RunCommand, runner.clone())
        .run()
        .await;

    assert!(matches!(result, Err(SupervisorError::Hierarchy { .. })));
    assert_eq!(runner.runs(), 0);
}

#[test_log::test(tokio::test)]
async fn test_membership_marker_is_registered() {
    let ensemble = MemoryEnsemble::new();
    let session = Arc::new(ensemble.session());
    let paths = JobPaths::new(SYNC_GROUP);

    supervisor(
        &session,
        ExitPolicy::RunCommand,
        ScriptedRunner::holding_for(Duration::ZERO),
    )
    .prepare()
    .await
    .unwrap();

    let hostname = local_hostname().unwrap();
    let marker = paths.member(&hostname);
    assert!(ensemble.exists(&paths.lock()));
    assert_eq!(ensemble.data(&marker), Some(hostname.into_bytes()));
}

#[test_log::test(tokio::test)]
async fn test_existing_membership_marker_is_not_fatal() {
    let ensemble = MemoryEnsemble::new();
    let first = Arc::new(ensemble.session());
    let second = Arc::new(ensemble.session());

    let runner = ScriptedRunner::holding_for(Duration::ZERO);
    supervisor(&first, ExitPolicy::RunCommand, runner.clone())
        .prepare()
        .await
        .unwrap();

    // Same host, so the marker already exists
    let code = supervisor(&second, ExitPolicy::RunCommand, runner.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(runner.runs(), 1);
}

// =============================================================================
// Mutual exclusion
// =============================================================================

#[test_log::test(tokio::test)]
async fn test_one_job_at_a_time_across_participants() {
    let ensemble = MemoryEnsemble::new();
    let runner = ScriptedRunner::holding_for(Duration::from_millis(30));

    let sessions: Vec<Arc<MemoryCoordinator>> =
        (0..4).map(|_| Arc::new(ensemble.session())).collect();
    let tasks: Vec<_> = sessions
        .iter()
        .map(|session| {
            let supervisor = supervisor(session, ExitPolicy::RunCommand, runner.clone());
            tokio::spawn(async move { supervisor.run().await })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), EXIT_SUCCESS);
    }
    assert_eq!(runner.runs(), 4);
    assert_eq!(runner.max_active(), 1);
}
