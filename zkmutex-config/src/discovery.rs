//! Configuration file discovery
//!
//! Looks for `zkmutex.{toml,yaml,yml,json}` in the system, user and working
//! directories. Files found later take precedence when merged.

use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Base name of every configuration file
pub const CONFIG_FILE_STEM: &str = "zkmutex";

/// Represents a discovered configuration file with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Full path to the configuration file
    pub path: PathBuf,
    /// Detected format of the file (TOML, YAML, JSON)
    pub format: ConfigFormat,
    /// Scope indicating where the file was found
    pub scope: ConfigScope,
}

impl ConfigFile {
    /// Classify a path by its extension
    pub fn from_path(path: &Path, scope: ConfigScope) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        let format = ConfigFormat::from_extension(extension)?;
        Some(Self {
            path: path.to_path_buf(),
            format,
            scope,
        })
    }
}

/// Configuration file format detected from file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format (.toml extension)
    Toml,
    /// YAML format (.yaml or .yml extensions)
    Yaml,
    /// JSON format (.json extension)
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Where a configuration file was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigScope {
    /// `/etc/zkmutex/`
    System,
    /// `~/.zkmutex/`
    User,
    /// Current working directory
    Project,
    /// Passed with `--config`
    Explicit,
}

/// File discovery service for finding configuration files
pub struct FileDiscovery {
    directories: Vec<(PathBuf, ConfigScope)>,
}

impl FileDiscovery {
    /// Discovery over the standard directories
    pub fn new() -> Self {
        let mut directories = vec![(PathBuf::from("/etc/zkmutex"), ConfigScope::System)];
        if let Some(home) = dirs::home_dir() {
            directories.push((home.join(".zkmutex"), ConfigScope::User));
        }
        if let Ok(cwd) = std::env::current_dir() {
            directories.push((cwd, ConfigScope::Project));
        }
        Self { directories }
    }

    /// Discovery over custom directories, lowest precedence first
    pub fn with_directories(directories: Vec<(PathBuf, ConfigScope)>) -> Self {
        Self { directories }
    }

    /// Discover all configuration files, lowest precedence first
    pub fn discover_all(&self) -> Vec<ConfigFile> {
        let mut files: Vec<ConfigFile> = self
            .directories
            .iter()
            .flat_map(|(dir, scope)| self.search_directory(dir, *scope))
            .collect();
        files.sort_by_key(|f| f.scope);

        debug!("Discovered {} configuration files", files.len());
        for file in &files {
            trace!("Found config: {} ({:?})", file.path.display(), file.format);
        }
        files
    }

    /// Search a single directory for configuration files
    fn search_directory(&self, dir: &Path, scope: ConfigScope) -> Vec<ConfigFile> {
        if !dir.exists() {
            trace!("Directory does not exist: {}", dir.display());
            return Vec::new();
        }
        if !dir.is_dir() {
            warn!("Path exists but is not a directory: {}", dir.display());
            return Vec::new();
        }

        ["toml", "yaml", "yml", "json"]
            .iter()
            .map(|ext| dir.join(format!("{}.{}", CONFIG_FILE_STEM, ext)))
            .filter(|candidate| candidate.is_file())
            .filter_map(|candidate| ConfigFile::from_path(&candidate, scope))
            .collect()
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}
