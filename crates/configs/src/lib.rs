//! Layered settings for the content engine.
//!
//! Loading order, later sources win:
//! 1. built-in defaults (`config/defaults.toml`)
//! 2. `config/default.toml` in the working directory, if present
//! 3. `config/{APP_ENV}.toml`, if present
//! 4. `BLOG_*` environment variables, `__` between nested keys
//!    (`BLOG_DATABASE__URL`, `BLOG_ENGINE__WALL_SAMPLE_SIZE`)

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::debug;

const DEFAULTS: &str = include_str!("../config/defaults.toml");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub engine: EngineSettings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// Postgres connection string. Without one the in-memory store is used.
    #[serde(default)]
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    pub root: PathBuf,
    pub url_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    pub counter_retry_attempts: u32,
    pub counter_retry_backoff_ms: u64,
    pub global_feed_includes_private: bool,
    pub wall_sample_size: usize,
}

impl EngineSettings {
    pub fn counter_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.counter_retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Settings {
    /// Reads `.env`, config files and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        debug!(%app_env, "loading settings");

        let config = Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{app_env}")).required(false))
            .add_source(
                Environment::with_prefix("BLOG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(config)
    }

    /// Defaults overlaid with a TOML document. No files or environment.
    pub fn from_toml(overrides: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .add_source(File::from_str(overrides, FileFormat::Toml))
            .build()?;
        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be at least 1".into()));
        }
        if self.engine.counter_retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "engine.counter_retry_attempts must be at least 1".into(),
            ));
        }
        if self.engine.wall_sample_size == 0 {
            return Err(ConfigError::Invalid("engine.wall_sample_size must be at least 1".into()));
        }
        Ok(())
    }
}
