//! Configuration management for drivelog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "drivelog";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "drivelog.db";

/// Prefix of configuration environment variables.
const ENV_PREFIX: &str = "DRIVELOG_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `DRIVELOG_`, sections separated
///    by `__`, e.g. `DRIVELOG_TOKEN__SECRET`)
/// 2. TOML config file at `~/.config/drivelog/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Token configuration.
    pub token: TokenConfig,
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Driver account configuration.
    pub drivers: DriversConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/drivelog/drivelog.db`
    pub database_path: Option<PathBuf>,
}

/// Token-related configuration.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Secret keying the token MAC.
    /// When unset, a secret is generated once and kept in the database.
    /// Never written back out.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
}

/// Driver account configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriversConfig {
    /// Minimum password length, in characters.
    pub min_password_length: usize,
    /// bcrypt work factor.
    pub bcrypt_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Default for DriversConfig {
    fn default() -> Self {
        Self {
            min_password_length: 6,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `DRIVELOG_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        Self::from_figment(Self::figment(&config_file))
    }

    /// The provider chain for a given config file.
    #[must_use]
    pub fn figment(config_file: &std::path::Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extract and validate a configuration from `figment`.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.token.secret, Some(secret) if secret.is_empty()) {
            return Err(Error::ConfigValidation {
                message: "token.secret must not be empty when set".to_string(),
            });
        }

        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(Error::ConfigValidation {
                message: format!("invalid server.bind address: {}", self.server.bind),
            });
        }

        if self.drivers.min_password_length == 0 {
            return Err(Error::ConfigValidation {
                message: "drivers.min_password_length must be greater than 0".to_string(),
            });
        }

        if !(4..=31).contains(&self.drivers.bcrypt_cost) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "drivers.bcrypt_cost ({}) must be between 4 and 31",
                    self.drivers.bcrypt_cost
                ),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid server.bind address: {}", self.server.bind),
            })
    }
}
