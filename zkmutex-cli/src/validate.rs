//! Preflight checks run before any coordination service call
//!
//! Every check either passes or returns a [`ValidationError`] describing what
//! is wrong. [`validate_all`] turns a loaded configuration into the typed
//! [`ValidatedConfig`] the supervisor works from.

use std::time::Duration;

use chrono::Utc;
use nix::unistd::{geteuid, Gid, Uid, User};
use serde::Serialize;
use thiserror::Error;
use zkmutex_common::{ErrorSeverity, Severity};
use zkmutex_config::{parse_signed_duration, ExitPolicy, JobSpec, ZkMutexConfig};
use zkmutex_leader_election::{ConnectString, CoordinationError};

/// A failed precondition
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid empty jobname")]
    EmptyJobName,

    #[error("Invalid exit policy: {0}")]
    InvalidExitPolicy(String),

    #[error("Invalid empty sync group")]
    EmptySyncGroup,

    #[error("Invalid success delay '{value}': {message}")]
    InvalidSuccessDelay { value: String, message: String },

    #[error("Success delay '{0}' would end before the job starts")]
    NegativeSuccessDelay(String),

    #[error("Invalid session timeout '{value}': {message}")]
    InvalidSessionTimeout { value: String, message: String },

    #[error("No command configured for job '{0}'")]
    EmptyCommand(String),

    #[error("Unknown user '{0}'")]
    UnknownUser(String),

    #[error("Failed to look up user '{user}': {message}")]
    UserLookup { user: String, message: String },

    #[error("Running job as '{user}' requires root privileges (effective uid is {euid})")]
    InsufficientPrivilege { user: String, euid: u32 },

    #[error("Invalid ensemble address")]
    InvalidEnsemble(#[source] CoordinationError),
}

impl Severity for ValidationError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Critical
    }
}

/// Account the job is switched to before it starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunAs {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
}

/// Configuration that passed every check
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedConfig {
    pub ensemble: String,
    pub sync_group: String,
    #[serde(skip)]
    pub address: ConnectString,
    #[serde(with = "zkmutex_config::humantime_serde")]
    pub session_timeout: Duration,
    pub run_as: Option<RunAs>,
    pub job: JobSpec,
}

pub fn validate_job_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyJobName);
    }
    Ok(())
}

pub fn validate_exit_policy(policy: &str) -> Result<ExitPolicy, ValidationError> {
    policy
        .parse()
        .map_err(|_| ValidationError::InvalidExitPolicy(policy.to_string()))
}

pub fn validate_sync_group(sync_group: &str) -> Result<(), ValidationError> {
    if sync_group.trim_matches('/').trim().is_empty() {
        return Err(ValidationError::EmptySyncGroup);
    }
    Ok(())
}

/// The delay, added to now, must not land before now
pub fn validate_success_delay(delay: &str) -> Result<Duration, ValidationError> {
    let parsed = parse_signed_duration("job.success_delay", delay).map_err(|e| {
        ValidationError::InvalidSuccessDelay {
            value: delay.to_string(),
            message: e.to_string(),
        }
    })?;

    let now = Utc::now();
    let ready_at =
        now.checked_add_signed(parsed)
            .ok_or_else(|| ValidationError::InvalidSuccessDelay {
                value: delay.to_string(),
                message: "out of range".to_string(),
            })?;
    if ready_at < now {
        return Err(ValidationError::NegativeSuccessDelay(delay.to_string()));
    }

    parsed
        .to_std()
        .map_err(|e| ValidationError::InvalidSuccessDelay {
            value: delay.to_string(),
            message: e.to_string(),
        })
}

pub fn validate_session_timeout(timeout: &str) -> Result<Duration, ValidationError> {
    humantime::parse_duration(timeout.trim()).map_err(|e| ValidationError::InvalidSessionTimeout {
        value: timeout.to_string(),
        message: e.to_string(),
    })
}

pub fn validate_command(job_name: &str, argv: &[String]) -> Result<(), ValidationError> {
    match argv.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::EmptyCommand(job_name.to_string())),
    }
}

/// Resolve the run-as user
///
/// Returns `None` when no user is configured or it is the current effective
/// user. Switching to anybody else needs root.
pub fn validate_run_as_user(user: Option<&str>) -> Result<Option<RunAs>, ValidationError> {
    let name = match user.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => return Ok(None),
    };

    let entry = User::from_name(name)
        .map_err(|e| ValidationError::UserLookup {
            user: name.to_string(),
            message: e.to_string(),
        })?
        .ok_or_else(|| ValidationError::UnknownUser(name.to_string()))?;

    check_switch(name, entry.uid, entry.gid, geteuid())
}

fn check_switch(
    name: &str,
    uid: Uid,
    gid: Gid,
    euid: Uid,
) -> Result<Option<RunAs>, ValidationError> {
    if uid == euid {
        return Ok(None);
    }
    if !euid.is_root() {
        return Err(ValidationError::InsufficientPrivilege {
            user: name.to_string(),
            euid: euid.as_raw(),
        });
    }
    Ok(Some(RunAs {
        name: name.to_string(),
        uid: uid.as_raw(),
        gid: gid.as_raw(),
    }))
}

/// Run every check in order, stopping at the first failure
pub fn validate_all(config: &ZkMutexConfig) -> Result<ValidatedConfig, ValidationError> {
    validate_job_name(&config.job.name)?;
    let exit_policy = validate_exit_policy(&config.job.exit_policy)?;
    validate_sync_group(&config.sync_group)?;
    let success_delay = validate_success_delay(&config.job.success_delay)?;

    let command = config.job.argv();
    validate_command(&config.job.name, &command)?;

    let session_timeout = validate_session_timeout(&config.session_timeout)?;
    let run_as = validate_run_as_user(config.user.as_deref())?;
    let address =
        ConnectString::parse(&config.ensemble).map_err(ValidationError::InvalidEnsemble)?;

    Ok(ValidatedConfig {
        ensemble: address.to_string(),
        sync_group: config.sync_group.trim_matches('/').to_string(),
        address,
        session_timeout,
        run_as,
        job: JobSpec {
            name: config.job.name.clone(),
            command,
            exit_policy,
            success_delay,
        },
    })
}
