use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
}

impl Config {
    /// Snapshot file to use, falling back to `queues_data.json` in the data directory
    pub fn snapshot_path(&self, data_dir: &Path) -> PathBuf {
        self.general
            .snapshot_file
            .clone()
            .unwrap_or_else(|| data_dir.join(DEFAULT_SNAPSHOT_FILE))
    }

    /// Log file to use when file logging is enabled
    pub fn log_path(&self, data_dir: &Path) -> PathBuf {
        self.general
            .log_file
            .clone()
            .unwrap_or_else(|| data_dir.join("sizedq.log"))
    }
}

/// Default snapshot file name inside the data directory
pub const DEFAULT_SNAPSHOT_FILE: &str = "queues_data.json";

/// General configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Snapshot file used by the CLI (default: <data dir>/queues_data.json)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_file: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Write logs to a rolling file instead of stderr
    #[serde(default)]
    pub file_logging: bool,

    /// Log file path when file logging is enabled (default: <data dir>/sizedq.log)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Level echoed to stderr while file logging is enabled
    #[serde(default = "default_console_level")]
    pub console_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            snapshot_file: None,
            log_level: default_log_level(),
            file_logging: false,
            log_file: None,
            console_level: default_console_level(),
        }
    }
}

// Default value functions for serde
fn default_log_level() -> String {
    "info".to_string()
}

fn default_console_level() -> String {
    "warn".to_string()
}

/// Trait for configuration storage
pub trait ConfigStorage: Send + Sync {
    /// Load configuration from file
    fn load(&self) -> Result<Config>;

    /// Save configuration to file
    fn save(&self, config: &Config) -> Result<()>;

    /// Get the config file path
    fn path(&self) -> &PathBuf;

    /// Create default configuration file if it doesn't exist
    fn create_default(&self) -> Result<()>;
}

/// TOML-based implementation of ConfigStorage
pub struct TomlConfigStorage {
    path: PathBuf,
}

impl TomlConfigStorage {
    /// Create a new TomlConfigStorage with the given path
    pub fn new(path: PathBuf) -> Self {
        TomlConfigStorage { path }
    }
}

impl ConfigStorage for TomlConfigStorage {
    fn load(&self) -> Result<Config> {
        // If file doesn't exist, create default and return it
        if !self.path.exists() {
            log::info!(
                "Config file not found at {:?}, creating default configuration",
                self.path
            );
            self.create_default()?;
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {:?}", self.path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", self.path))?;

        log::debug!(
            "Loaded configuration from {:?}: log_level={}, file_logging={}",
            self.path,
            config.general.log_level,
            config.general.file_logging
        );

        Ok(config)
    }

    fn save(&self, config: &Config) -> Result<()> {
        let toml_str = toml::to_string_pretty(config)
            .with_context(|| "Failed to serialize configuration")?;

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        fs::write(&self.path, toml_str)
            .with_context(|| format!("Failed to write config to {:?}", self.path))?;

        log::debug!("Saved configuration to {:?}", self.path);

        Ok(())
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }

    fn create_default(&self) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        // Use the example config compiled into the binary
        let example_config = include_str!("../../sizedq.toml.example");

        fs::write(&self.path, example_config)
            .with_context(|| format!("Failed to create default config at {:?}", self.path))?;

        log::info!("Created default configuration at {:?}", self.path);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn test_config_defaults() {
        let config = GeneralConfig::default();
        assert_eq!(config.snapshot_file, None);
        assert_eq!(config.log_level, "info");
        assert!(!config.file_logging);
        assert_eq!(config.console_level, "warn");
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(include_str!("../../sizedq.toml.example")).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert!(!config.general.file_logging);
        assert_eq!(config.general.snapshot_file, None);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
        [general]
        snapshot_file = "/tmp/queues.json"
        file_logging = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.snapshot_path(Path::new("/data")),
            PathBuf::from("/tmp/queues.json")
        );
        assert!(config.general.file_logging);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(
            config.log_path(Path::new("/data")),
            PathBuf::from("/data/sizedq.log")
        );
    }

    #[test]
    fn test_default_snapshot_path() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(
            config.snapshot_path(Path::new("/data")),
            PathBuf::from("/data/queues_data.json")
        );
    }

    static NEXT_ID: AtomicU64 = AtomicU64::new(1);

    fn unique_dir(prefix: &str) -> PathBuf {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "sizedq-config-{prefix}-{}-{nanos}-{id}",
            std::process::id()
        ))
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = unique_dir("default");
        let storage = TomlConfigStorage::new(dir.join("sizedq.toml"));
        assert!(!storage.path().exists());

        let config = storage.load().unwrap();
        assert!(storage.path().exists());
        assert_eq!(config.general.log_level, "info");

        let mut changed = config.clone();
        changed.general.log_level = "debug".to_string();
        storage.save(&changed).unwrap();
        assert_eq!(storage.load().unwrap().general.log_level, "debug");

        fs::remove_dir_all(&dir).ok();
    }
}
