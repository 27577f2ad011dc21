//! Locating, reading and writing `config.toml`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::app_config::LoaderConfig;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No platform config directory could be determined.
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
    /// Reading or writing the file failed.
    #[error("config file io: {0}")]
    Io(#[from] std::io::Error),
    /// Serializing the configuration failed.
    #[error("config serialization: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Reads and writes the loader configuration in one directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Uses the platform config directory.
    ///
    /// # Errors
    /// Returns [`ConfigError::NoConfigDir`] when the platform has none.
    pub fn new() -> Result<Self, ConfigError> {
        LoaderConfig::default_config_dir()
            .map(Self::with_dir)
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Uses `dir` instead of the platform directory.
    #[must_use]
    pub const fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory holding `config.toml`.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file [`load_config`](Self::load_config) would read.
    #[must_use]
    pub fn config_path(&self, path_override: Option<&Path>) -> PathBuf {
        path_override.map_or_else(|| self.dir.join(CONFIG_FILE_NAME), Path::to_path_buf)
    }

    /// Reads the configuration. A missing file is created with defaults;
    /// a malformed one is left alone and defaults are used with a warning.
    /// Out-of-range values are clamped with a warning.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] when the file cannot be read or created.
    pub fn load_config(&self, path_override: Option<&Path>) -> Result<LoaderConfig, ConfigError> {
        let path = self.config_path(path_override);

        if !path.exists() {
            info!(path = %path.display(), "No config file, writing defaults");
            let config = LoaderConfig::default();
            write_atomic(&path, &config)?;
            return Ok(config);
        }

        let content = fs::read_to_string(&path)?;
        let mut config = match toml::from_str::<LoaderConfig>(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed config file, using defaults");
                return Ok(LoaderConfig::default());
            }
        };
        clamp_ranges(&mut config);
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Writes `config` to `config.toml` in this store's directory.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if serialization or the write fails.
    pub fn save_config(&self, config: &LoaderConfig) -> Result<(), ConfigError> {
        write_atomic(&self.dir.join(CONFIG_FILE_NAME), config)
    }
}

fn write_atomic(path: &Path, config: &LoaderConfig) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

fn clamp_ranges(config: &mut LoaderConfig) {
    if !(config.memory.budget_fraction > 0.0 && config.memory.budget_fraction <= 1.0) {
        warn!(value = config.memory.budget_fraction, "memory.budget_fraction out of range, using 0.25");
        config.memory.budget_fraction = 0.25;
    }
    if !(1..=100).contains(&config.storage.jpeg_quality) {
        let clamped = config.storage.jpeg_quality.clamp(1, 100);
        warn!(value = config.storage.jpeg_quality, clamped, "storage.jpeg_quality out of range");
        config.storage.jpeg_quality = clamped;
    }
    if config.workers.load_workers == 0 {
        warn!("workers.load_workers is 0, using 1");
        config.workers.load_workers = 1;
    }
    if config.workers.cache_writers == 0 {
        warn!("workers.cache_writers is 0, using 1");
        config.workers.cache_writers = 1;
    }
}
