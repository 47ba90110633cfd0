//! Running the job while the lock is held

use std::process::ExitStatus;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use zkmutex_common::{ErrorSeverity, Severity};
use zkmutex_config::JobSpec;

use crate::validate::RunAs;

/// How a job run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The process exited by itself
    Exited { code: Option<i32>, success: bool },
    /// The process was killed on request
    Stopped,
}

impl JobOutcome {
    fn from_status(status: ExitStatus) -> Self {
        JobOutcome::Exited {
            code: status.code(),
            success: status.success(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job '{job}' has no command")]
    NoCommand { job: String },

    #[error("Failed to start '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for job '{job}'")]
    Wait {
        job: String,
        #[source]
        source: std::io::Error,
    },
}

impl Severity for JobError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }
}

/// Executes the job governed by the lock
///
/// `stop` fires when the lock is gone; the runner must end the job then.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(
        &self,
        job: &JobSpec,
        stop: oneshot::Receiver<()>,
    ) -> Result<JobOutcome, JobError>;
}

/// Runs the job as a child process
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    run_as: Option<RunAs>,
}

impl CommandRunner {
    pub fn new(run_as: Option<RunAs>) -> Self {
        Self { run_as }
    }

    fn command(&self, job: &JobSpec) -> Result<(Command, String), JobError> {
        let (program, args) = job.command.split_first().ok_or_else(|| JobError::NoCommand {
            job: job.name.clone(),
        })?;

        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);
        if let Some(user) = &self.run_as {
            debug!("Job {} runs as {} ({})", job.name, user.name, user.uid);
            command.uid(user.uid).gid(user.gid);
        }
        Ok((command, program.clone()))
    }
}

enum Step {
    Exited(std::io::Result<ExitStatus>),
    Ready,
    Stop,
}

#[async_trait]
impl JobRunner for CommandRunner {
    async fn run(
        &self,
        job: &JobSpec,
        mut stop: oneshot::Receiver<()>,
    ) -> Result<JobOutcome, JobError> {
        let (mut command, program) = self.command(job)?;
        let mut child = command
            .spawn()
            .map_err(|source| JobError::Spawn { program, source })?;
        info!(pid = child.id(), "Started job {}", job.name);

        let started = Instant::now();
        let ready = tokio::time::sleep(job.success_delay);
        tokio::pin!(ready);
        let mut ready_seen = false;

        loop {
            let step = tokio::select! {
                status = child.wait() => Step::Exited(status),
                _ = &mut ready, if !ready_seen => Step::Ready,
                _ = &mut stop => Step::Stop,
            };

            match step {
                Step::Ready => {
                    ready_seen = true;
                    info!(
                        "Job {} is up after {}",
                        job.name,
                        humantime::format_duration(job.success_delay)
                    );
                }
                Step::Exited(status) => {
                    let status = status.map_err(|source| JobError::Wait {
                        job: job.name.clone(),
                        source,
                    })?;
                    let outcome = JobOutcome::from_status(status);
                    if status.success() {
                        info!("Job {} finished after {:?}", job.name, started.elapsed());
                    } else {
                        warn!("Job {} failed after {:?}: {}", job.name, started.elapsed(), status);
                    }
                    return Ok(outcome);
                }
                Step::Stop => {
                    warn!("Stopping job {}", job.name);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill job {}: {}", job.name, e);
                    }
                    return Ok(JobOutcome::Stopped);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn shell(script: &str, success_delay: Duration) -> JobSpec {
        JobSpec {
            name: "test".to_string(),
            command: vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()],
            exit_policy: zkmutex_config::ExitPolicy::RunCommand,
            success_delay,
        }
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let (_tx, rx) = oneshot::channel();
        let outcome = CommandRunner::default()
            .run(&shell("exit 3", Duration::ZERO), rx)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Exited {
                code: Some(3),
                success: false
            }
        );
    }

    #[tokio::test]
    async fn test_success_delay_does_not_end_the_job() {
        let (_tx, rx) = oneshot::channel();
        let outcome = CommandRunner::default()
            .run(&shell("sleep 0.2", Duration::from_millis(10)), rx)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Exited {
                code: Some(0),
                success: true
            }
        );
    }

    #[tokio::test]
    async fn test_stop_kills_the_job() {
        let (tx, rx) = oneshot::channel();
        let job = shell("sleep 30", Duration::ZERO);
        let runner = CommandRunner::default();

        let started = Instant::now();
        let run = tokio::spawn(async move { runner.run(&job, rx).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();

        assert_eq!(run.await.unwrap().unwrap(), JobOutcome::Stopped);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let (_tx, rx) = oneshot::channel();
        let job = JobSpec {
            command: vec!["/nonexistent/zkmutex-job".to_string()],
            ..shell("", Duration::ZERO)
        };
        let err = CommandRunner::default().run(&job, rx).await.unwrap_err();
        assert!(matches!(err, JobError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_empty_command() {
        let (_tx, rx) = oneshot::channel();
        let job = JobSpec {
            command: Vec::new(),
            ..shell("", Duration::ZERO)
        };
        let err = CommandRunner::default().run(&job, rx).await.unwrap_err();
        assert!(matches!(err, JobError::NoCommand { .. }));
    }
}
