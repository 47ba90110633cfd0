//! Core data structures for the zkmutex configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Session timeout used when none is configured
pub const DEFAULT_SESSION_TIMEOUT: &str = "30s";

/// What a participant does once its job ends or its lock is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExitPolicy {
    /// Go back into the election after every run or lock loss
    #[default]
    #[serde(alias = "reaquire-lock")]
    ReacquireLock,
    /// Run once after winning, then exit
    RunCommand,
    /// Exit as soon as the lock is lost or cannot be acquired
    Terminate,
}

impl ExitPolicy {
    /// All accepted spellings, canonical names first
    pub const VALUES: [&'static str; 3] = ["reacquire-lock", "run-command", "terminate"];

    /// Canonical configuration literal
    pub fn as_str(self) -> &'static str {
        match self {
            ExitPolicy::ReacquireLock => "reacquire-lock",
            ExitPolicy::RunCommand => "run-command",
            ExitPolicy::Terminate => "terminate",
        }
    }
}

impl fmt::Display for ExitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reacquire-lock" | "reaquire-lock" => Ok(ExitPolicy::ReacquireLock),
            "run-command" => Ok(ExitPolicy::RunCommand),
            "terminate" => Ok(ExitPolicy::Terminate),
            other => Err(ConfigError::invalid_value(
                "job.exit_policy",
                format!(
                    "Invalid exit policy: {} (expected one of {})",
                    other,
                    Self::VALUES.join(", ")
                ),
            )),
        }
    }
}

/// Parse a humantime duration that may carry a leading minus sign
///
/// `"90s"`, `"1m 30s"` and `"-1s"` are all accepted. Negative values are kept
/// so the validation layer can reject them with a proper message.
pub fn parse_signed_duration(key: &str, value: &str) -> ConfigResult<chrono::Duration> {
    let trimmed = value.trim();
    let (negative, magnitude) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };

    let parsed = humantime::parse_duration(magnitude)
        .map_err(|e| ConfigError::invalid_value(key, format!("'{}': {}", value, e)))?;
    let delta = chrono::Duration::from_std(parsed)
        .map_err(|e| ConfigError::invalid_value(key, format!("'{}': {}", value, e)))?;

    Ok(if negative { -delta } else { delta })
}

/// The job section of the configuration, as written by the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Name of the job, used in logs
    pub name: String,
    /// Program, optionally followed by arguments, to run while holding the lock
    pub command: Vec<String>,
    /// Extra arguments appended to `command`
    pub args: Vec<String>,
    /// One of [`ExitPolicy::VALUES`]
    pub exit_policy: String,
    /// How long the job must run before it counts as successfully started
    pub success_delay: String,
}

impl JobConfig {
    /// `command` followed by `args`
    pub fn argv(&self) -> Vec<String> {
        self.command.iter().chain(self.args.iter()).cloned().collect()
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            command: Vec::new(),
            args: Vec::new(),
            exit_policy: ExitPolicy::default().as_str().to_string(),
            success_delay: "0s".to_string(),
        }
    }
}

/// Complete zkmutex configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZkMutexConfig {
    /// `server1,server2,.../chroot` address of the ensemble
    pub ensemble: String,
    /// Participants sharing this id exclude each other
    pub sync_group: String,
    /// Account the job should run as
    pub user: Option<String>,
    /// ZooKeeper session timeout (humantime)
    pub session_timeout: String,
    /// The job to run while holding the lock
    pub job: JobConfig,
}

impl Default for ZkMutexConfig {
    fn default() -> Self {
        Self {
            ensemble: String::new(),
            sync_group: String::new(),
            user: None,
            session_timeout: DEFAULT_SESSION_TIMEOUT.to_string(),
            job: JobConfig::default(),
        }
    }
}

/// A validated job, immutable for the life of the process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSpec {
    /// Name of the job
    pub name: String,
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// What to do after a run or a lock loss
    pub exit_policy: ExitPolicy,
    /// Runtime after which the job counts as successfully started
    #[serde(with = "humantime_serde")]
    pub success_delay: Duration,
}

/// Serde helpers writing durations in humantime notation
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
