//! zkmutex configuration management using Figment
//!
//! Loads the settings a zkmutex participant needs: the ensemble address, the
//! sync group, the account to run as and the job description. Values come
//! from layered sources with a clear precedence order.
//!
//! # Sources
//!
//! - Built-in defaults
//! - `/etc/zkmutex/zkmutex.{toml,yaml,yml,json}`
//! - `~/.zkmutex/zkmutex.{toml,yaml,yml,json}`
//! - `./zkmutex.{toml,yaml,yml,json}`
//! - The file given with `--config`
//! - `ZKMUTEX_` environment variables, e.g. `ZKMUTEX_JOB__EXIT_POLICY=terminate`
//!
//! ## Example TOML Configuration
//!
//! ```toml
//! ensemble = "zk1:2181,zk2:2181,zk3:2181/zkmutex"
//! sync_group = "nightly-backup"
//! user = "backup"
//! session_timeout = "30s"
//!
//! [job]
//! name = "backup"
//! command = ["/usr/local/bin/backup", "--full"]
//! exit_policy = "reacquire-lock"
//! success_delay = "10s"
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use zkmutex_config::ConfigProvider;
//!
//! let config = ConfigProvider::new().load()?;
//! println!("sync group: {}", config.sync_group);
//! # Ok::<(), zkmutex_config::ConfigError>(())
//! ```

pub mod discovery;
pub mod error;
pub mod provider;
pub mod types;

pub use discovery::{ConfigFile, ConfigFormat, ConfigScope, FileDiscovery, CONFIG_FILE_STEM};
pub use error::ConfigError;
pub use provider::{ConfigProvider, ENV_PREFIX};
pub use types::{
    humantime_serde, parse_signed_duration, ExitPolicy, JobConfig, JobSpec, ZkMutexConfig,
    DEFAULT_SESSION_TIMEOUT,
};

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

