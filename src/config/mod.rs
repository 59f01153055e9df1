//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::calculate::TierPolicy;
use crate::storage::StoreBackend;

/// Environment variable prefix for layered configuration.
pub const ENV_PREFIX: &str = "STEPS";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load layered config: {0}")]
    SourceError(#[from] ::config::ConfigError),

    #[error("Failed to render config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. `"*"` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Record store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

/// Ranking configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default)]
    pub tier_policy: TierPolicy,
}

/// Character image configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Base URL for character images; entries carry no image when unset
    #[serde(default)]
    pub image_base_url: Option<String>,
}

impl AssetsConfig {
    pub fn image_base(&self) -> Result<Option<Url>, ConfigError> {
        self.image_base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| {
                    ConfigError::ValidationError(format!("Invalid image base URL {:?}: {}", raw, e))
                })
            })
            .transpose()
    }
}

/// Developer-only routes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevConfig {
    #[serde(default)]
    pub enable_test_routes: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StoreConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default)]
    pub dev: DevConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            server: ServerConfig::default(),
            storage: StoreConfig::default(),
            ranking: RankingConfig::default(),
            assets: AssetsConfig::default(),
            dev: DevConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load an optional TOML file overlaid with `STEPS__*` environment
    /// variables (e.g. `STEPS__SERVER__PORT=8080`). List fields take
    /// comma-separated values (`STEPS__SERVER__CORS_ORIGINS=http://a,http://b`).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_layered(path, Self::environment())
    }

    fn environment() -> ::config::Environment {
        ::config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("server.cors_origins")
            .try_parsing(true)
    }

    fn load_layered(path: &Path, env: ::config::Environment) -> Result<Self, ConfigError> {
        let config: AppConfig = ::config::Config::builder()
            .add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(env)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.server.cors_origins.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one CORS origin is required".to_string(),
            ));
        }

        self.assets.image_base()?;

        Ok(())
    }
}
