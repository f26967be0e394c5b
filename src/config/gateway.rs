use secrecy::SecretString;

use crate::config::helpers::{optional_env, parse_env, parse_string_env};
use crate::error::ConfigError;
use crate::settings::Settings;

/// Admin HTTP surface.
#[derive(Debug)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token required on every route except health. `None` leaves
    /// the API closed.
    pub auth_token: Option<SecretString>,
}

impl GatewayConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let auth_token = optional_env("GATEWAY_AUTH_TOKEN")?
            .or_else(|| settings.gateway.auth_token.clone())
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        Ok(Self {
            host: parse_string_env("GATEWAY_HOST", settings.gateway.host.clone())?,
            port: parse_env("GATEWAY_PORT", settings.gateway.port)?,
            auth_token,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use crate::settings::Settings;

    #[test]
    fn gateway_defaults_to_loopback() {
        let config = super::GatewayConfig::resolve(&Settings::default()).expect("config");
        assert_eq!(config.bind_addr(), "127.0.0.1:3030");
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn token_from_settings_is_kept_secret() {
        let mut settings = Settings::default();
        settings.gateway.auth_token = Some("s3cret".to_string());
        let config = super::GatewayConfig::resolve(&settings).expect("config");
        let token = config.auth_token.expect("token");
        assert_eq!(token.expose_secret(), "s3cret");
        assert!(!format!("{token:?}").contains("s3cret"));
    }
}
