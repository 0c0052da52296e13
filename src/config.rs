//! Configuration loading for the lpass helper
//!
//! Configuration is loaded from a TOML file. Every field has a default, so
//! the helper works without any file present.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::HelperError;

/// Folder at the root of the LastPass account holding every entry
/// managed by this helper
pub const DEFAULT_NAMESPACE: &str = "Docker Credentials";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// lpass configuration
    pub lpass: LpassConfig,
}

/// lpass runner and store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LpassConfig {
    /// Path to lpass binary
    pub binary: PathBuf,
    /// Folder all entries live under
    pub namespace: String,
    /// Value passed to `lpass ls --format`
    pub list_format: String,
    /// Timeout for a single lpass invocation; unset waits indefinitely
    pub timeout_secs: Option<u64>,
}

impl Default for LpassConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("lpass"),
            namespace: DEFAULT_NAMESPACE.to_string(),
            list_format: "%ai".to_string(),
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("lpass-helper").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".lpass-helper.toml"))
    }

    /// Load configuration from file, falling back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self, HelperError> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .map_err(|e| HelperError::Config(format!("failed to read config: {e}")))?;
            let config: Config = toml::from_str(&contents)
                .map_err(|e| HelperError::Config(format!("failed to parse config: {e}")))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("no config file found at {}, using defaults", config_path.display());
            Ok(Config::default())
        }
    }

    /// Replace the namespace, e.g. from `LASTPASS_FOLDER`
    pub fn with_namespace(mut self, namespace: Option<String>) -> Result<Self, HelperError> {
        if let Some(ns) = namespace {
            self.lpass.namespace = ns;
            self.validate()?;
        }
        Ok(self)
    }

    fn validate(&self) -> Result<(), HelperError> {
        let ns = self.lpass.namespace.trim_matches('/');
        if ns.is_empty() {
            return Err(HelperError::Config("lpass.namespace must not be empty".to_string()));
        }
        if self.lpass.list_format.is_empty() {
            return Err(HelperError::Config("lpass.list_format must not be empty".to_string()));
        }
        Ok(())
    }
}
