//! Legacy case migration.
//!
//! Legacy rows carry a free-text case number and type and no secure
//! identifier. `migrate` mints identifiers for them in sequential batches,
//! `rollback` reverses a run from the snapshot it returned, and `validate`
//! reports identifier anomalies across the whole table.
//!
//! The engine never persists rollback data itself; the caller owns it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::{CaseRecord, CaseStore, MigratedCaseUpdate};
use crate::enterprise::case_id::{self, CaseIdentifier, CorrelationKey, MAX_MINT_ATTEMPTS};
use crate::enterprise::types::{CaseStatus, PracticeArea};
use crate::error::DatabaseError;

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOptions {
    pub dry_run: bool,
    pub batch_size: usize,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Pre-migration snapshot of one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackEntry {
    pub id: i64,
    pub original_case_number: Option<String>,
    pub original_type: Option<String>,
    /// Absent in snapshots written before statuses were captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_status: Option<String>,
    /// Identifiers the row already carried before the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_case_key: Option<CorrelationKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_display_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationItemError {
    pub case_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub total: usize,
    pub migrated: usize,
    pub errors: Vec<MigrationItemError>,
    pub rollback_data: Vec<RollbackEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub attempted: usize,
    pub restored: usize,
    pub failures: Vec<MigrationItemError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationValidation {
    pub total_cases: u64,
    pub migrated_cases: u64,
    pub duplicate_secure_ids: u64,
    pub invalid_formats: u64,
    pub missing_uuids: u64,
}

impl MigrationValidation {
    /// Whether every anomaly counter is zero.
    pub fn is_clean(&self) -> bool {
        self.duplicate_secure_ids == 0 && self.invalid_formats == 0 && self.missing_uuids == 0
    }
}

/// Legacy free-text case type to practice area. Unknown or absent types
/// fall back to civil.
pub fn map_legacy_type(legacy_type: Option<&str>) -> PracticeArea {
    let Some(raw) = legacy_type else {
        return PracticeArea::Civil;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "civil" | "other" => PracticeArea::Civil,
        "criminal" => PracticeArea::Criminal,
        "family" => PracticeArea::Family,
        "corporate" => PracticeArea::Corporate,
        "tax" => PracticeArea::Tax,
        "ip" => PracticeArea::Ip,
        "immigration" => PracticeArea::Immigration,
        "personal_injury" => PracticeArea::PersonalInjury,
        "real_estate" => PracticeArea::RealEstate,
        _ => PracticeArea::Civil,
    }
}

/// Legacy status string to the case status enumeration. Canonical values
/// pass through; anything else opens.
pub fn map_legacy_status(legacy_status: Option<&str>) -> CaseStatus {
    let Some(raw) = legacy_status else {
        return CaseStatus::Open;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "active" | "in_progress" => CaseStatus::InProgress,
        "pending" | "open" => CaseStatus::Open,
        "closed" => CaseStatus::Closed,
        "on_hold" => CaseStatus::OnHold,
        _ => CaseStatus::Open,
    }
}

pub struct MigrationEngine {
    store: Arc<dyn CaseStore>,
}

impl MigrationEngine {
    pub fn new(store: Arc<dyn CaseStore>) -> Self {
        Self { store }
    }

    pub async fn migrate(&self, options: MigrationOptions) -> Result<MigrationResult, DatabaseError> {
        let candidates = self.store.list_legacy_cases().await?;
        let mut result = MigrationResult {
            total: candidates.len(),
            ..Default::default()
        };
        tracing::info!(total = result.total, "Found legacy cases to migrate");

        if options.dry_run {
            tracing::info!("Dry run, no changes will be made");
            return Ok(result);
        }

        for batch in candidates.chunks(options.batch_size.max(1)) {
            for legacy in batch {
                let snapshot = RollbackEntry {
                    id: legacy.id,
                    original_case_number: legacy.case_number.clone(),
                    original_type: legacy.case_type.clone(),
                    original_status: Some(legacy.status.clone()),
                    original_case_key: legacy.correlation_key,
                    original_display_id: legacy.display_id.clone(),
                };
                result.rollback_data.push(snapshot);

                match self.migrate_one(legacy).await {
                    Ok(display_id) => {
                        result.migrated += 1;
                        tracing::debug!(
                            case_id = legacy.id,
                            legacy = legacy.case_number.as_deref().unwrap_or("-"),
                            display_id = %display_id,
                            "Migrated case"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(case_id = legacy.id, "Failed to migrate case: {}", e);
                        result.errors.push(MigrationItemError {
                            case_id: legacy.id,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        tracing::info!(
            migrated = result.migrated,
            total = result.total,
            errors = result.errors.len(),
            "Migration completed"
        );
        Ok(result)
    }

    /// Mint whichever half of the identifier pair the row lacks. An existing
    /// correlation key is never replaced: activity rows reference it.
    async fn migrate_one(&self, legacy: &CaseRecord) -> Result<String, DatabaseError> {
        let practice_area = map_legacy_type(legacy.case_type.as_deref());
        let status = map_legacy_status(Some(legacy.status.as_str()));
        let kept_display_id = legacy
            .display_id
            .as_deref()
            .filter(|id| case_id::validate(id))
            .map(str::to_string);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let minted = case_id::generate(practice_area);
            let identifier = CaseIdentifier {
                display_id: kept_display_id.clone().unwrap_or(minted.display_id),
                correlation_key: legacy.correlation_key.unwrap_or(minted.correlation_key),
            };
            let display_id = identifier.display_id.clone();
            let update = MigratedCaseUpdate {
                id: legacy.id,
                identifier,
                legacy_case_number: legacy
                    .case_number
                    .clone()
                    .or_else(|| legacy.legacy_case_number.clone()),
                practice_area,
                status,
            };
            match self.store.apply_migration(&update).await {
                Ok(()) => return Ok(display_id),
                Err(DatabaseError::Constraint(message)) if attempt < MAX_MINT_ATTEMPTS => {
                    tracing::debug!(case_id = legacy.id, attempt, "Identifier collision: {}", message);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Restore each snapshot. Failures are logged and reported, never fatal.
    pub async fn rollback(&self, rollback_data: &[RollbackEntry]) -> RollbackReport {
        tracing::info!(count = rollback_data.len(), "Rolling back migrated cases");
        let mut report = RollbackReport {
            attempted: rollback_data.len(),
            ..Default::default()
        };

        for entry in rollback_data {
            match self.store.revert_migration(entry).await {
                Ok(()) => {
                    report.restored += 1;
                    tracing::debug!(case_id = entry.id, "Rolled back case");
                }
                Err(e) => {
                    tracing::warn!(case_id = entry.id, "Failed to roll back case: {}", e);
                    report.failures.push(MigrationItemError {
                        case_id: entry.id,
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    pub async fn validate(&self) -> Result<MigrationValidation, DatabaseError> {
        let stats = self.store.case_identifier_stats().await?;
        let invalid_formats = self
            .store
            .list_display_ids()
            .await?
            .iter()
            .filter(|id| !case_id::validate(id))
            .count() as u64;

        Ok(MigrationValidation {
            total_cases: stats.total_cases,
            migrated_cases: stats.migrated_cases,
            duplicate_secure_ids: stats.duplicate_display_ids,
            invalid_formats,
            missing_uuids: stats.missing_correlation_keys,
        })
    }
}
