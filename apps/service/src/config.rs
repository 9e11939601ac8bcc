use std::time::Duration;
use std::{env, fmt, fs, path};

use probe::request::DEFAULT_USER_AGENT;
use probe::request::validation::validate_timeout;
use probe::timing::DEFAULT_MAX_BODY_BYTES;
use probe::{ExecutorOptions, SinkOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
    #[error("invalid executor timeout: {0}")]
    InvalidTimeout(#[from] probe::ConfigError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub executor: ExecutorConfig,
    pub sink: SinkConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// libsql database file
    pub path: path::PathBuf,
    pub pool_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the object store holding bodies and headers
    pub root: path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub location: String,
    pub timeout_ms: u64,
    pub max_body_bytes: usize,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub structured_timeout_ms: u64,
    pub blob_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often the set of active monitors is reloaded
    pub refresh_secs: u64,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

fn config_home() -> Result<path::PathBuf, Error> {
    if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        Ok(path::PathBuf::from(config_home))
    } else if let Some(home_dir) = env::home_dir() {
        Ok(home_dir.join(".config"))
    } else {
        Err(Error::ConfigPathUnavailable)
    }
}

/// Get default config path ($XDG_CONFIG_HOME/httpmon/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    Ok(config_home()?.join("httpmon/config.toml"))
}

/// Data lives next to the config unless configured otherwise
fn default_data_dir() -> path::PathBuf {
    config_home().map(|home| home.join("httpmon")).unwrap_or_else(|_| path::PathBuf::from("."))
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_data_dir().join("httpmon.db"), pool_size: 8 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: default_data_dir().join("objects") }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            location: "local".into(),
            timeout_ms: 30_000,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { structured_timeout_ms: 5_000, blob_timeout_ms: 10_000 }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { refresh_secs: 30 }
    }
}

impl ExecutorConfig {
    pub fn options(&self) -> ExecutorOptions {
        ExecutorOptions {
            location: self.location.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            user_agent: self.user_agent.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

impl SinkConfig {
    pub fn options(&self) -> SinkOptions {
        SinkOptions {
            structured_timeout: Duration::from_millis(self.structured_timeout_ms),
            blob_timeout: Duration::from_millis(self.blob_timeout_ms),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Configuration:")?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path.display())?;
        write_1(f, "Pool Size", &self.database.pool_size)?;
        write_title_1(f, "Storage")?;
        write_1(f, "Root", &self.storage.root.display())?;
        write_title_1(f, "Executor")?;
        write_1(f, "Location", &self.executor.location)?;
        write_1(f, "Timeout (ms)", &self.executor.timeout_ms)?;
        write_1(f, "Max Body (bytes)", &self.executor.max_body_bytes)?;
        write_1(f, "User Agent", &self.executor.user_agent)?;
        write_title_1(f, "Sink")?;
        write_1(f, "Structured Timeout (ms)", &self.sink.structured_timeout_ms)?;
        write_1(f, "Blob Timeout (ms)", &self.sink.blob_timeout_ms)?;
        write_title_1(f, "Scheduler")?;
        write_1(f, "Refresh (s)", &self.scheduler.refresh_secs)?;

        Ok(())
    }
}

impl Config {
    /// Load the config file, writing a default one first if none exists.
    ///
    /// Reads `~/.config/httpmon/config.toml` unless a path is given.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            let config: Self = toml::from_str(raw_string.as_str())?;
            validate_timeout(config.executor.timeout_ms)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str = toml::to_string_pretty(self)?;
        let write_failed = |source| Error::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_written_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config");

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config.executor.timeout_ms, 30_000);
        assert!(dir.path().join("nested/config.toml").exists());

        let reloaded = Config::from_config(Some(&path)).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[executor]\nlocation = \"eu-west\"\ntimeout_ms = 5000\n").unwrap();

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config.executor.location, "eu-west");
        assert_eq!(config.executor.options().timeout, Duration::from_secs(5));
        assert_eq!(config.sink.blob_timeout_ms, 10_000);
        assert_eq!(config.database.pool_size, 8);
    }

    #[test]
    fn test_out_of_range_timeout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[executor]\ntimeout_ms = 0\n").unwrap();

        let result = Config::from_config(Some(&path));
        assert!(matches!(result, Err(Error::InvalidTimeout(_))));
    }

    #[test]
    fn test_display_lists_sections() {
        let rendered = Config::default().to_string();
        assert!(rendered.contains("Database"));
        assert!(rendered.contains("Timeout (ms): 30000"));
    }
}
