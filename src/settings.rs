//! TOML settings file.
//!
//! Every field is defaulted, so a missing file or a partial file is fine.
//! Environment variables override these values in `Config::resolve`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const SETTINGS_ENV: &str = "LEGALCITY_SETTINGS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub enterprise: EnterpriseSettings,
    pub gateway: GatewaySettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Defaults to `~/.legalcity/enterprise.db`.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnterpriseSettings {
    pub phase_key: String,
    pub schedule_key: String,
    pub migration_batch_size: usize,
    pub case_sla_days: u32,
    pub audit_enabled: bool,
}

impl Default for EnterpriseSettings {
    fn default() -> Self {
        Self {
            phase_key: crate::enterprise::phase::DEFAULT_PHASE_KEY.to_string(),
            schedule_key: crate::enterprise::phase::DEFAULT_SCHEDULE_KEY.to_string(),
            migration_batch_size: crate::enterprise::migration::DEFAULT_BATCH_SIZE,
            case_sla_days: crate::enterprise::desk::DEFAULT_SLA_DAYS,
            audit_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,
    pub auth_token: Option<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            auth_token: None,
        }
    }
}

/// `~/.legalcity`, or the working directory when there is no home.
pub fn base_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".legalcity"))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_settings_path() -> PathBuf {
    base_dir().join("settings.toml")
}

impl Settings {
    /// Load from `$LEGALCITY_SETTINGS`, else the default path.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_settings_path);
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };
        toml::from_str(&raw).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}
