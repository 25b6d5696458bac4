//! Configuration management for keyward.
//!
//! This module provides multi-layer configuration support with:
//! - File-based configuration
//! - Environment variable overrides
//! - Programmatic updates
//! - Auto-save capability
//!
//! ## Configuration Layers
//!
//! Configuration values are resolved in this priority order:
//! 1. Environment variables (`KEYWARD_*`)
//! 2. Programmatically set values
//! 3. Values loaded from file
//! 4. Default values
//!
//! ## Example
//!
//! ```no_run
//! use keyward_core::config::{Config, ToolSettings};
//!
//! // Resolve the tool settings (~/.keyward/config plus environment)
//! let settings = ToolSettings::load()?;
//! println!("kadmin: {}", settings.kadmin_path);
//!
//! // Low-level access to a single key
//! let mut config = Config::load(ToolSettings::default_path()?)?;
//! config.set("keytool_path", "/opt/jdk/bin/keytool")?;
//! config.save()?;
//! # Ok::<(), keyward_types::KeywardError>(())
//! ```

use keyward_types::{KeywardError, LogLevel, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::util::data::{deep_merge, get_path, set_path};

/// Prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "KEYWARD_";

/// Configuration layer priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigLayer {
    /// Default values
    Default = 0,
    /// Values loaded from file
    Loaded = 1,
    /// Values set programmatically
    Set = 2,
    /// Values from environment variables
    Environment = 3,
}

impl ConfigLayer {
    const LOWEST_FIRST: [ConfigLayer; 4] = [
        ConfigLayer::Default,
        ConfigLayer::Loaded,
        ConfigLayer::Set,
        ConfigLayer::Environment,
    ];
}

/// Main configuration structure with multi-layer support.
///
/// This is the low-level configuration type. Typed settings are built on
/// top of it by [`ToolSettings`].
#[derive(Clone, Debug, Default)]
pub struct Config {
    layers: HashMap<ConfigLayer, Value>,
    file_path: Option<PathBuf>,
    auto_save: bool,
}

impl Config {
    /// Create a new configuration from a file path.
    ///
    /// If the file doesn't exist, an empty configuration is created.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut layers = HashMap::new();

        if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| KeywardError::Config(format!("Failed to read config file: {}", e)))?;

            let value: Value = serde_yaml::from_str(&content)
                .map_err(|e| KeywardError::Config(format!("Failed to parse config: {}", e)))?;

            // An empty file parses as null
            if !value.is_null() {
                layers.insert(ConfigLayer::Loaded, value);
            }
        }

        Ok(Self {
            layers,
            file_path: Some(path.to_path_buf()),
            auto_save: false,
        })
    }

    /// Replace the default layer.
    pub fn with_defaults(mut self, defaults: impl Serialize) -> Result<Self> {
        let value = serde_json::to_value(defaults)
            .map_err(|e| KeywardError::Config(format!("Failed to serialize defaults: {}", e)))?;
        self.layers.insert(ConfigLayer::Default, value);
        Ok(self)
    }

    /// Populate the environment layer from `(name, value)` pairs.
    ///
    /// Names carrying `prefix` map to the lowercased remainder
    /// (`KEYWARD_KADMIN_PATH` → `kadmin_path`); values are read as YAML
    /// scalars so `true` and `false` become booleans.
    pub fn with_env_vars<I>(mut self, prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut env = serde_json::Map::new();
        for (name, raw) in vars {
            let Some(key) = name.strip_prefix(prefix) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            let value = serde_yaml::from_str::<Value>(&raw)
                .ok()
                .filter(|v| !v.is_null() && !v.is_object() && !v.is_array())
                .unwrap_or(Value::String(raw));
            env.insert(key.to_ascii_lowercase(), value);
        }
        if !env.is_empty() {
            self.layers.insert(ConfigLayer::Environment, Value::Object(env));
        }
        self
    }

    /// Populate the environment layer from the process environment.
    pub fn with_env(self, prefix: &str) -> Self {
        self.with_env_vars(prefix, std::env::vars())
    }

    /// Get a configuration value by key, respecting layer priority.
    ///
    /// Returns None if the key doesn't exist in any layer.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        ConfigLayer::LOWEST_FIRST.iter().rev().find_map(|layer| {
            let data = self.layers.get(layer)?;
            let value = get_path(data, key)?;
            serde_json::from_value(value.clone()).ok()
        })
    }

    /// Set a configuration value programmatically.
    pub fn set(&mut self, key: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| KeywardError::Config(format!("Failed to serialize value: {}", e)))?;

        let set_layer = self
            .layers
            .entry(ConfigLayer::Set)
            .or_insert_with(|| Value::Object(Default::default()));

        set_path(set_layer, key, value)?;

        if self.auto_save {
            self.save()?;
        }

        Ok(())
    }

    /// Save the loaded and programmatically set values to file.
    ///
    /// Defaults and environment overrides are not persisted.
    pub fn save(&self) -> Result<()> {
        let path = self
            .file_path
            .as_ref()
            .ok_or_else(|| KeywardError::Config("Cannot save: no file path set".to_string()))?;

        let persisted = self.merge(&[ConfigLayer::Loaded, ConfigLayer::Set]);

        let yaml = serde_yaml::to_string(&persisted)
            .map_err(|e| KeywardError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, yaml)
            .map_err(|e| KeywardError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get merged data from all layers.
    pub fn merged_data(&self) -> Value {
        self.merge(&ConfigLayer::LOWEST_FIRST)
    }

    /// Enable auto-save on changes.
    pub fn with_auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    fn merge(&self, layers: &[ConfigLayer]) -> Value {
        layers
            .iter()
            .filter_map(|layer| self.layers.get(layer))
            .fold(Value::Object(Default::default()), |merged, data| {
                deep_merge(merged, data.clone())
            })
    }
}

/// Backend used for key generation and store conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialToolKind {
    /// In-process key generation and store codecs
    #[default]
    Native,
    /// The JDK `keytool` command
    Keytool,
}

impl FromStr for CredentialToolKind {
    type Err = KeywardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(CredentialToolKind::Native),
            "keytool" => Ok(CredentialToolKind::Keytool),
            _ => Err(KeywardError::Config(format!(
                "Unknown credential tool '{}': expected native or keytool",
                s
            ))),
        }
    }
}

impl fmt::Display for CredentialToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialToolKind::Native => write!(f, "native"),
            CredentialToolKind::Keytool => write!(f, "keytool"),
        }
    }
}

/// Output format of a log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output
    #[default]
    Pretty,
    /// Single-line output
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// One log destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log file path (`~` is expanded)
    pub path: String,
    /// Log level for this output
    pub level: LogLevel,
    /// Log format
    #[serde(default)]
    pub format: LogFormat,
}

/// Settings of the keyward tool itself (`~/.keyward/config`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Credential tool backend
    #[serde(default)]
    pub credential_tool: CredentialToolKind,

    /// Path or name of the `keytool` command
    #[serde(default = "default_keytool_path")]
    pub keytool_path: String,

    /// Path of the `kadmin` utility; `NONE` disables kadmin
    #[serde(default = "default_kadmin_path")]
    pub kadmin_path: String,

    /// Kerberos configuration file
    #[serde(default = "default_krb5_conf")]
    pub krb5_conf: PathBuf,

    /// Whether the store codecs may write PKCS12 stores without a password
    #[serde(default = "default_true")]
    pub passwordless_pkcs12: bool,

    /// Additional log destinations
    #[serde(default)]
    pub logs: Vec<LogConfig>,
}

fn default_keytool_path() -> String {
    "keytool".to_string()
}

fn default_kadmin_path() -> String {
    "/usr/kerberos/sbin/kadmin".to_string()
}

fn default_krb5_conf() -> PathBuf {
    PathBuf::from("/etc/krb5.conf")
}

fn default_true() -> bool {
    true
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            credential_tool: CredentialToolKind::default(),
            keytool_path: default_keytool_path(),
            kadmin_path: default_kadmin_path(),
            krb5_conf: default_krb5_conf(),
            passwordless_pkcs12: true,
            logs: Vec::new(),
        }
    }
}

impl ToolSettings {
    /// Load settings from the default location plus `KEYWARD_*` overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    /// Load settings from a specific path plus `KEYWARD_*` overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::load(path)?.with_env(ENV_PREFIX);
        Self::from_config(&config)
    }

    /// Build settings from a resolved configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        serde_json::from_value(config.merged_data())
            .map_err(|e| KeywardError::Config(format!("Failed to parse tool settings: {}", e)))
    }

    /// Get the default path for the tool settings.
    pub fn default_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".keyward").join("config"))
            .ok_or_else(|| KeywardError::Config("Could not determine home directory".to_string()))
    }
}
