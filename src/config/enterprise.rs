use crate::config::helpers::{parse_bool_env, parse_env, parse_string_env};
use crate::enterprise::desk::MAX_SLA_DAYS;
use crate::error::ConfigError;
use crate::settings::Settings;

/// Rollout, migration and audit controls.
#[derive(Debug, Clone)]
pub struct EnterpriseConfig {
    pub phase_key: String,
    pub schedule_key: String,
    pub migration_batch_size: usize,
    pub case_sla_days: u32,
    pub audit_enabled: bool,
}

fn non_empty_key(key: &str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "configuration key must not be empty".to_string(),
        });
    }
    Ok(value)
}

impl Default for EnterpriseConfig {
    fn default() -> Self {
        let defaults = crate::settings::EnterpriseSettings::default();
        Self {
            phase_key: defaults.phase_key,
            schedule_key: defaults.schedule_key,
            migration_batch_size: defaults.migration_batch_size,
            case_sla_days: defaults.case_sla_days,
            audit_enabled: defaults.audit_enabled,
        }
    }
}

impl EnterpriseConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let migration_batch_size = parse_env(
            "MIGRATION_BATCH_SIZE",
            settings.enterprise.migration_batch_size,
        )?;
        if migration_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MIGRATION_BATCH_SIZE".to_string(),
                message: "batch size must be at least 1".to_string(),
            });
        }

        let case_sla_days = parse_env("CASE_SLA_DAYS", settings.enterprise.case_sla_days)?;
        if case_sla_days > MAX_SLA_DAYS {
            return Err(ConfigError::InvalidValue {
                key: "CASE_SLA_DAYS".to_string(),
                message: format!("SLA may not exceed {MAX_SLA_DAYS} days"),
            });
        }

        Ok(Self {
            phase_key: non_empty_key(
                "PHASE_CONFIG_KEY",
                parse_string_env("PHASE_CONFIG_KEY", settings.enterprise.phase_key.clone())?,
            )?,
            schedule_key: non_empty_key(
                "PHASE_SCHEDULE_KEY",
                parse_string_env(
                    "PHASE_SCHEDULE_KEY",
                    settings.enterprise.schedule_key.clone(),
                )?,
            )?,
            migration_batch_size,
            case_sla_days,
            audit_enabled: parse_bool_env("AUDIT_ENABLED", settings.enterprise.audit_enabled)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ConfigError;
    use crate::settings::Settings;

    #[test]
    fn enterprise_resolve_uses_defaults() {
        let config = super::EnterpriseConfig::resolve(&Settings::default()).expect("config");
        assert_eq!(config.phase_key, "communication_enforcement_phase");
        assert_eq!(config.schedule_key, "phase_transition_schedule");
        assert_eq!(config.migration_batch_size, 100);
        assert_eq!(config.case_sla_days, 30);
        assert!(config.audit_enabled);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut settings = Settings::default();
        settings.enterprise.migration_batch_size = 0;
        let err = super::EnterpriseConfig::resolve(&settings).expect_err("must reject 0");
        let ConfigError::InvalidValue { key, .. } = err else {
            panic!("expected InvalidValue");
        };
        assert_eq!(key, "MIGRATION_BATCH_SIZE");
    }

    #[test]
    fn oversized_sla_is_rejected() {
        let mut settings = Settings::default();
        settings.enterprise.case_sla_days = u32::MAX;
        let err = super::EnterpriseConfig::resolve(&settings).expect_err("must reject");
        let ConfigError::InvalidValue { key, .. } = err else {
            panic!("expected InvalidValue");
        };
        assert_eq!(key, "CASE_SLA_DAYS");
    }

    #[test]
    fn blank_phase_key_is_rejected() {
        let mut settings = Settings::default();
        settings.enterprise.phase_key = "  ".to_string();
        assert!(super::EnterpriseConfig::resolve(&settings).is_err());
    }
}
