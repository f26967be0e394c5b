//! Runtime configuration.
//!
//! Resolution order for every value: environment variable, then the TOML
//! settings file, then the built-in default. `.env` is loaded first.

mod enterprise;
mod gateway;
pub(crate) mod helpers;

use std::path::PathBuf;

pub use enterprise::EnterpriseConfig;
pub use gateway::GatewayConfig;

use crate::config::helpers::optional_env;
use crate::error::ConfigError;
use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl DatabaseConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let raw = optional_env("LEGALCITY_DB_PATH")?.or_else(|| settings.database.path.clone());
        let path = match raw {
            Some(raw) => PathBuf::from(raw),
            None => crate::settings::base_dir().join("enterprise.db"),
        };
        Ok(Self { path })
    }
}

#[derive(Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    pub enterprise: EnterpriseConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    /// Load `.env`, the settings file, and the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let settings = Settings::load()?;
        Self::resolve(&settings)
    }

    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            database: DatabaseConfig::resolve(settings)?,
            enterprise: EnterpriseConfig::resolve(settings)?,
            gateway: GatewayConfig::resolve(settings)?,
        })
    }
}
