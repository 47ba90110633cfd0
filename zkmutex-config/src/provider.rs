//! Configuration provider using Figment for zkmutex

use crate::{
    discovery::{ConfigFile, ConfigFormat, ConfigScope, FileDiscovery},
    error::ConfigError,
    types::ZkMutexConfig,
    ConfigResult,
};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Prefix of the environment variables read into the configuration
pub const ENV_PREFIX: &str = "ZKMUTEX_";

/// Configuration provider using figment
///
/// Sources are merged in this order, later ones winning:
/// 1. Built-in defaults
/// 2. Discovered files (`/etc/zkmutex`, `~/.zkmutex`, working directory)
/// 3. The file passed with `--config`
/// 4. `ZKMUTEX_` environment variables, `__` separating nested keys
/// 5. Command line overrides
pub struct ConfigProvider {
    discovery: FileDiscovery,
    explicit: Option<PathBuf>,
    overrides: Option<serde_json::Value>,
}

impl ConfigProvider {
    /// Provider over the standard discovery directories
    pub fn new() -> Self {
        Self {
            discovery: FileDiscovery::new(),
            explicit: None,
            overrides: None,
        }
    }

    /// Replace the discovery used to find configuration files
    pub fn with_discovery(mut self, discovery: FileDiscovery) -> Self {
        self.discovery = discovery;
        self
    }

    /// Also load this file, which must exist
    pub fn with_explicit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    /// Values taking precedence over every other source
    ///
    /// Must serialize to a map shaped like [`ZkMutexConfig`]. Null fields are
    /// dropped so unset command line options do not mask other sources.
    pub fn with_overrides(mut self, overrides: serde_json::Value) -> Self {
        self.overrides = Some(strip_nulls(overrides));
        self
    }

    /// Load the merged configuration
    pub fn load(&self) -> ConfigResult<ZkMutexConfig> {
        let figment = self.build_figment()?;
        let config: ZkMutexConfig = figment.extract()?;
        debug!(
            "Loaded configuration for sync group '{}' job '{}'",
            config.sync_group, config.job.name
        );
        Ok(config)
    }

    /// Build the figment with all sources in precedence order
    pub fn build_figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(ZkMutexConfig::default()));

        for config_file in self.discovery.discover_all() {
            figment = figment.merge(load_config_file(&config_file));
        }

        if let Some(path) = &self.explicit {
            figment = figment.merge(load_config_file(&explicit_file(path)?));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(overrides) = &self.overrides {
            trace!("Applying command line overrides");
            figment = figment.merge(Serialized::defaults(overrides.clone()));
        }

        Ok(figment)
    }
}

impl Default for ConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn explicit_file(path: &Path) -> ConfigResult<ConfigFile> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    ConfigFile::from_path(path, ConfigScope::Explicit).ok_or_else(|| {
        ConfigError::UnsupportedFormat {
            format: path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_else(|| "<none>".to_string()),
        }
    })
}

fn load_config_file(config_file: &ConfigFile) -> Figment {
    trace!(
        "Loading config file: {} ({:?})",
        config_file.path.display(),
        config_file.format
    );
    let path = &config_file.path;
    match config_file.format {
        ConfigFormat::Toml => Figment::from(Toml::file(path)),
        ConfigFormat::Yaml => Figment::from(Yaml::file(path)),
        ConfigFormat::Json => Figment::from(Json::file(path)),
    }
}

fn strip_nulls(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        other => other,
    }
}
