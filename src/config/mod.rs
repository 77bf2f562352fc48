// src/config/mod.rs
mod schema;

use std::path::{Path, PathBuf};
use config::{Config as ConfigLoader, FileFormat};
use tracing::{info, warn, debug};

pub use schema::{
    Config, GlobalConfig, ExitPolicy, HttpConfig,
    SourcesConfig, MangaDexConfig, BatotoConfig
};

use crate::engine::MAX_WORKERS;
use crate::error::{ScrapeResult, ScrapeError};

/// Built-in defaults, mirrored by `Config::default()`
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Prefix for environment overrides, e.g. `MANGASCRAPE__GLOBAL__WORKERS=16`
pub const ENV_PREFIX: &str = "MANGASCRAPE";

/// Centralized configuration handling
impl Config {
    /// Load configuration: defaults, then a user file, then environment variables
    pub fn load(config_path: Option<&Path>) -> ScrapeResult<Self> {
        debug!("Loading configuration");

        let mut config_builder = ConfigLoader::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        match config_path {
            Some(path) if path.exists() => {
                info!("Loading user configuration from: {}", path.display());
                config_builder = config_builder.add_source(config::File::from(path));
            }
            Some(path) => {
                return Err(ScrapeError::ConfigError(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    info!("Loading configuration from: {}", default_path.display());
                    config_builder = config_builder.add_source(config::File::from(default_path.as_path()));
                } else {
                    debug!("No configuration file found, using built-in defaults");
                }
            }
        }

        config_builder = config_builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX).separator("__")
        );

        config_builder
            .build()
            .map_err(|e| ScrapeError::ConfigError(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ScrapeError::ConfigError(format!("Failed to parse configuration: {}", e)))
    }

    /// Get the default configuration path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mangascrape/config.toml")
    }

    /// Write the default configuration to `path`, refusing to overwrite unless `force`
    pub fn init(path: &Path, force: bool) -> ScrapeResult<()> {
        if path.exists() && !force {
            return Err(ScrapeError::ConfigError(format!(
                "Configuration already exists at {}. Use --force to overwrite.",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScrapeError::FileError {
                    path: parent.to_path_buf(),
                    message: format!("Failed to create directory: {}", e),
                })?;
        }

        Config::default().save(path)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ScrapeResult<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| ScrapeError::SerializationError(format!("Failed to serialize configuration: {}", e)))?;

        std::fs::write(path, config_str)
            .map_err(|e| ScrapeError::FileError {
                path: path.to_path_buf(),
                message: format!("Failed to write configuration: {}", e),
            })?;

        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Number of pool workers, with non-positive requests mapped to the pool default
    /// and anything above [`MAX_WORKERS`] clamped to it
    pub fn effective_workers(requested: Option<i64>, configured: usize) -> usize {
        match requested {
            Some(n) if n > 0 => usize::try_from(n).map_or(MAX_WORKERS, |n| n.min(MAX_WORKERS)),
            Some(_) => {
                warn!("Non-positive worker count requested, using the pool default");
                0
            }
            None => configured.min(MAX_WORKERS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_defaults_match_default_impl() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_user_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[global]\nworkers = 2\nexit_policy = \"fail_on_source_error\"\n\n[sources.batoto]\npages = 3").unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.global.workers, 2);
        assert_eq!(config.global.exit_policy, ExitPolicy::FailOnSourceError);
        assert_eq!(config.sources.batoto.pages, 3);
        assert_eq!(config.sources.batoto.base_url, "https://bato.to");
        assert_eq!(config.sources.mangadex.page_size, 100);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(ScrapeError::ConfigError(_))));
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.toml");

        Config::init(&path, false).unwrap();
        assert!(Config::init(&path, false).is_err());
        Config::init(&path, true).unwrap();

        let saved: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, Config::default());
    }

    #[test]
    fn test_effective_workers() {
        assert_eq!(Config::effective_workers(Some(6), 8), 6);
        assert_eq!(Config::effective_workers(Some(0), 8), 0);
        assert_eq!(Config::effective_workers(Some(-3), 8), 0);
        assert_eq!(Config::effective_workers(None, 8), 8);
        assert_eq!(Config::effective_workers(Some(1_000_000_000_000_000_000), 8), MAX_WORKERS);
        assert_eq!(Config::effective_workers(Some(i64::MAX), 8), MAX_WORKERS);
        assert_eq!(Config::effective_workers(None, usize::MAX), MAX_WORKERS);
    }
}
