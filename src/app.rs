//! Component wiring shared by the CLI and the gateway.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::{Config, EnterpriseConfig};
use crate::db::Database;
use crate::enterprise::audit::AuditLedger;
use crate::enterprise::desk::CaseDesk;
use crate::enterprise::migration::{
    MigrationEngine, MigrationOptions, MigrationResult, MigrationValidation, RollbackEntry,
};
use crate::enterprise::phase::{PhaseController, RolloutPhase};
use crate::error::{DatabaseError, MigrationRunError, RollbackFileError};

/// The enterprise core assembled over one database.
pub struct Components {
    pub db: Arc<dyn Database>,
    pub ledger: AuditLedger,
    pub phases: Arc<PhaseController>,
    pub desk: Arc<CaseDesk>,
    pub migrations: MigrationEngine,
    pub batch_size: usize,
}

impl Components {
    /// Open the configured database and assemble everything on top of it.
    pub async fn from_config(config: &Config) -> Result<Self, DatabaseError> {
        let db = crate::db::connect_from_config(&config.database).await?;
        tracing::debug!(path = %config.database.path.display(), "Database ready");
        Ok(Self::assemble(db, &config.enterprise))
    }

    pub fn assemble(db: Arc<dyn Database>, config: &EnterpriseConfig) -> Self {
        let ledger = if config.audit_enabled {
            AuditLedger::new(db.clone())
        } else {
            tracing::info!("Audit ledger disabled by configuration");
            AuditLedger::disabled()
        };

        let phases = Arc::new(
            PhaseController::new(db.clone(), db.clone(), ledger.clone())
                .with_keys(config.phase_key.clone(), config.schedule_key.clone()),
        );
        let desk = Arc::new(
            CaseDesk::new(db.clone(), phases.clone(), ledger.clone())
                .with_sla_days(config.case_sla_days),
        );
        let migrations = MigrationEngine::new(db.clone());

        Self {
            db,
            ledger,
            phases,
            desk,
            migrations,
            batch_size: config.migration_batch_size,
        }
    }
}

/// Outcome of [`run_enterprise_migration`].
#[derive(Debug, Clone, Serialize)]
pub struct FullMigrationReport {
    pub legacy_cases: usize,
    pub migration: Option<MigrationResult>,
    pub rollback_file: Option<PathBuf>,
    pub validation: MigrationValidation,
    /// Set only when validation came back clean.
    pub phase: Option<RolloutPhase>,
}

/// Write rollback snapshots to `dir/migration-rollback-<unix-ms>.json`.
pub fn save_rollback_file(
    dir: &Path,
    entries: &[RollbackEntry],
) -> Result<PathBuf, RollbackFileError> {
    let path = dir.join(format!(
        "migration-rollback-{}.json",
        chrono::Utc::now().timestamp_millis()
    ));
    let io_err = |source| RollbackFileError::Io {
        path: path.display().to_string(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;
    let json = serde_json::to_string_pretty(entries).map_err(|source| {
        RollbackFileError::Malformed {
            path: path.display().to_string(),
            source,
        }
    })?;
    std::fs::write(&path, json).map_err(io_err)?;
    Ok(path)
}

pub fn load_rollback_file(path: &Path) -> Result<Vec<RollbackEntry>, RollbackFileError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RollbackFileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| RollbackFileError::Malformed {
        path: path.display().to_string(),
        source,
    })
}

/// Dry run, migrate, save rollback data, validate, then seed the rollout
/// phase. Stops short of the phase when validation finds anomalies.
pub async fn run_enterprise_migration(
    components: &Components,
    rollback_dir: &Path,
) -> Result<FullMigrationReport, MigrationRunError> {
    let preview = components
        .migrations
        .migrate(MigrationOptions {
            dry_run: true,
            batch_size: components.batch_size,
        })
        .await?;
    tracing::info!(legacy_cases = preview.total, "Analyzed legacy cases");

    let mut migration = None;
    let mut rollback_file = None;
    if preview.total > 0 {
        let result = components
            .migrations
            .migrate(MigrationOptions {
                dry_run: false,
                batch_size: components.batch_size,
            })
            .await?;
        for failure in &result.errors {
            tracing::warn!(case_id = failure.case_id, "Migration error: {}", failure.error);
        }
        let path = save_rollback_file(rollback_dir, &result.rollback_data)?;
        tracing::info!(path = %path.display(), "Rollback data saved");
        rollback_file = Some(path);
        migration = Some(result);
    }

    let validation = components.migrations.validate().await?;
    let phase = if validation.is_clean() {
        Some(components.phases.ensure_initialized().await?)
    } else {
        tracing::warn!(
            duplicate_secure_ids = validation.duplicate_secure_ids,
            invalid_formats = validation.invalid_formats,
            missing_uuids = validation.missing_uuids,
            "Validation issues detected, rollout phase left untouched"
        );
        None
    };

    Ok(FullMigrationReport {
        legacy_cases: preview.total,
        migration,
        rollback_file,
        validation,
        phase,
    })
}
