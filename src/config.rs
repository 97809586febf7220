use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::logger::{LogStyle, Severity, default_prefix};

pub const DEFAULT_APP_NAME: &str = "ws";
pub const CONFIG_FILENAME: &str = "config.json";
pub const DEFAULT_MAX_BYTES: u64 = 500_000;
pub const DEFAULT_BACKUP_COUNT: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Can't determine the home directory")]
    NoHomeDir,

    #[error("Can't write config {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Can't serialize config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted launcher settings (`config.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "LOG_LEVEL")]
    pub log_level: Severity,

    /// Rotation threshold for the log file, in bytes.
    #[serde(rename = "MAX_BYTES")]
    pub max_bytes: u64,

    /// Number of rotated log files kept next to the active one.
    #[serde(rename = "BACKUP_COUNT")]
    pub backup_count: u32,

    #[serde(rename = "DEBUG_PREFIX")]
    pub debug_prefix: String,

    #[serde(rename = "INFO_PREFIX")]
    pub info_prefix: String,

    #[serde(rename = "WARNING_PREFIX")]
    pub warning_prefix: String,

    #[serde(rename = "ERROR_PREFIX")]
    pub error_prefix: String,

    #[serde(rename = "CRITICAL_PREFIX")]
    pub critical_prefix: String,

    /// Directory the launcher was last started from; informational only.
    #[serde(rename = "CURRENT_DIR")]
    pub current_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: Severity::Info,
            max_bytes: DEFAULT_MAX_BYTES,
            backup_count: DEFAULT_BACKUP_COUNT,
            debug_prefix: default_prefix(Severity::Debug),
            info_prefix: default_prefix(Severity::Info),
            warning_prefix: default_prefix(Severity::Warning),
            error_prefix: default_prefix(Severity::Error),
            critical_prefix: default_prefix(Severity::Critical),
            current_dir: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl AppConfig {
    /// Loads `path` layered over the defaults.
    ///
    /// A missing or malformed file yields the defaults. Keys are merged one at
    /// a time, so an unusable value only loses that key; unknown keys are ignored.
    pub fn load(path: &Path) -> Self {
        let defaults = Self::default();
        let Ok(text) = fs::read_to_string(path) else {
            return defaults;
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(overrides)) => defaults.merged_with(&overrides),
            _ => defaults,
        }
    }

    fn merged_with(self, overrides: &Map<String, Value>) -> Self {
        let Ok(Value::Object(mut merged)) = serde_json::to_value(&self) else {
            return self;
        };

        for (key, value) in overrides {
            let Some(slot) = merged.get_mut(key) else {
                continue;
            };
            let previous = std::mem::replace(slot, value.clone());
            let accepted = serde_json::from_value::<Self>(Value::Object(merged.clone()))
                .is_ok_and(|candidate| candidate.is_valid());
            if !accepted {
                merged.insert(key.clone(), previous);
            }
        }

        serde_json::from_value(Value::Object(merged)).unwrap_or(self)
    }

    pub fn is_valid(&self) -> bool {
        self.max_bytes > 0
    }

    /// Writes the config as pretty JSON, creating the directory if needed.
    pub fn persist(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut body = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut body, formatter);
        self.serialize(&mut serializer)?;
        body.push(b'\n');

        fs::write(path, body).map_err(write_err)
    }

    pub fn style(&self) -> LogStyle {
        LogStyle::new([
            self.debug_prefix.clone(),
            self.info_prefix.clone(),
            self.warning_prefix.clone(),
            self.error_prefix.clone(),
            self.critical_prefix.clone(),
        ])
    }
}

/// Per-application locations under the config root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub app_name: String,
    pub config_dir: PathBuf,
}

impl AppPaths {
    pub fn new(config_root: &Path, app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            config_dir: config_root.join(app_name),
        }
    }

    /// `$XDG_CONFIG_HOME` when set, otherwise `~/.config`; the application name
    /// is the stem of the executable this process was started as.
    pub fn resolve() -> Result<Self, ConfigError> {
        let config_root = match std::env::var_os("XDG_CONFIG_HOME") {
            Some(root) if !root.is_empty() => PathBuf::from(root),
            _ => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join(".config"),
        };
        let app_name = std::env::args_os()
            .next()
            .as_deref()
            .map(Path::new)
            .and_then(Path::file_stem)
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());

        Ok(Self::new(&config_root, &app_name))
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILENAME)
    }

    pub fn log_file(&self) -> PathBuf {
        self.config_dir.join(format!("{}.log", self.app_name))
    }
}
