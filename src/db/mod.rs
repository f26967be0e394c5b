//! Database abstraction layer.
//!
//! Provides a backend-agnostic `Database` trait that unifies the persistence
//! operations the enterprise core needs. The shipped backend is libSQL
//! (embedded SQLite fork). `memory` holds in-process stores that tests and
//! embedders substitute for the narrow sub-traits.

pub mod libsql;
pub mod libsql_migrations;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::enterprise::audit::AuditEntry;
use crate::enterprise::case_id::{CaseIdentifier, CorrelationKey};
use crate::enterprise::migration::RollbackEntry;
use crate::enterprise::types::{AuditAction, CaseStatus, PracticeArea, Role};
use crate::error::DatabaseError;

/// Open the configured database, bootstrap the schema, and return it.
pub async fn connect_from_config(
    config: &crate::config::DatabaseConfig,
) -> Result<Arc<dyn Database>, DatabaseError> {
    let backend = libsql::LibSqlBackend::new_local(&config.path).await?;
    backend.run_migrations().await?;
    Ok(Arc::new(backend))
}

/// A row of the `cases` table, legacy or migrated.
///
/// `status` stays raw because legacy rows hold free-text statuses until they
/// are migrated; use [`CaseRecord::status`] for the typed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: i64,
    pub correlation_key: Option<CorrelationKey>,
    pub display_id: Option<String>,
    pub case_number: Option<String>,
    pub legacy_case_number: Option<String>,
    pub case_type: Option<String>,
    pub title: String,
    pub practice_area: Option<PracticeArea>,
    pub status: String,
    pub client_id: Option<i64>,
    pub assigned_lawyer_id: Option<i64>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CaseRecord {
    pub fn status(&self) -> Option<CaseStatus> {
        CaseStatus::from_db_value(&self.status)
    }

    /// Legacy rows predate the secure identifier scheme.
    pub fn is_legacy(&self) -> bool {
        self.display_id.is_none() || self.correlation_key.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewCaseParams {
    pub identifier: CaseIdentifier,
    pub title: String,
    pub description: Option<String>,
    pub practice_area: PracticeArea,
    pub status: CaseStatus,
    pub client_id: Option<i64>,
    pub assigned_lawyer_id: Option<i64>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub created_by: i64,
}

/// Shape of a pre-migration case row.
#[derive(Debug, Clone, Default)]
pub struct LegacyCaseParams {
    pub case_number: Option<String>,
    pub case_type: Option<String>,
    pub status: Option<String>,
    pub title: String,
    pub client_id: Option<i64>,
    pub assigned_lawyer_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct MigratedCaseUpdate {
    pub id: i64,
    pub identifier: CaseIdentifier,
    pub legacy_case_number: Option<String>,
    pub practice_area: PracticeArea,
    pub status: CaseStatus,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CaseFilter {
    pub assigned_lawyer_id: Option<i64>,
    pub client_id: Option<i64>,
}

/// Aggregate identifier counts used by migration validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaseIdentifierStats {
    pub total_cases: u64,
    pub migrated_cases: u64,
    pub duplicate_display_ids: u64,
    pub missing_correlation_keys: u64,
}

/// Free-form items whose case association the rollout tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Message,
    Document,
}

impl ActivityKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Message => "chat_messages",
            Self::Document => "documents",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMessageParams {
    pub case_key: Option<CorrelationKey>,
    pub display_id: Option<String>,
    pub sender_id: i64,
    pub sender_role: Role,
    pub content: String,
    pub is_internal_note: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocumentParams {
    pub case_key: Option<CorrelationKey>,
    pub display_id: Option<String>,
    pub uploaded_by: i64,
    pub file_name: String,
    pub document_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub case_key: Option<CorrelationKey>,
    pub display_id: Option<String>,
    pub uploaded_by: i64,
    pub file_name: String,
    pub document_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssociationCounts {
    pub total: u64,
    pub associated: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyAssociation {
    pub date: NaiveDate,
    pub total: u64,
    pub associated: u64,
}

/// Versioned row of the `system_config` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredAuditEntry {
    pub id: i64,
    pub entry: AuditEntry,
}

#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub since: Option<DateTime<Utc>>,
    pub case_key: Option<CorrelationKey>,
    pub action: Option<AuditAction>,
    pub limit: Option<usize>,
}

// ==================== Sub-traits ====================
//
// Each sub-trait groups related persistence methods. The `Database` supertrait
// combines them all; leaf consumers depend on the narrow sub-trait.

#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Insert a new case. A display-id collision fails with
    /// `DatabaseError::Constraint`.
    async fn insert_case(&self, input: &NewCaseParams) -> Result<CaseRecord, DatabaseError>;
    async fn insert_legacy_case(&self, input: &LegacyCaseParams) -> Result<i64, DatabaseError>;
    async fn get_case_by_id(&self, id: i64) -> Result<Option<CaseRecord>, DatabaseError>;
    async fn get_case_by_key(
        &self,
        key: CorrelationKey,
    ) -> Result<Option<CaseRecord>, DatabaseError>;
    async fn get_case_by_display_id(
        &self,
        display_id: &str,
    ) -> Result<Option<CaseRecord>, DatabaseError>;
    async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<CaseRecord>, DatabaseError>;
    /// Cases lacking a display identifier or a correlation key.
    async fn list_legacy_cases(&self) -> Result<Vec<CaseRecord>, DatabaseError>;
    async fn apply_migration(&self, update: &MigratedCaseUpdate) -> Result<(), DatabaseError>;
    async fn revert_migration(&self, entry: &RollbackEntry) -> Result<(), DatabaseError>;
    async fn update_case_status(
        &self,
        key: CorrelationKey,
        status: CaseStatus,
        updated_by: i64,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;
    async fn touch_case_activity(
        &self,
        key: CorrelationKey,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
    /// Delete a case; its messages and documents go with it.
    async fn delete_case(&self, key: CorrelationKey) -> Result<bool, DatabaseError>;
    async fn case_identifier_stats(&self) -> Result<CaseIdentifierStats, DatabaseError>;
    async fn list_display_ids(&self) -> Result<Vec<String>, DatabaseError>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn insert_message(&self, input: &NewMessageParams) -> Result<i64, DatabaseError>;
    async fn insert_document(&self, input: &NewDocumentParams) -> Result<i64, DatabaseError>;
    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>, DatabaseError>;
    async fn count_case_activity(
        &self,
        kind: ActivityKind,
        key: CorrelationKey,
    ) -> Result<u64, DatabaseError>;
    async fn association_counts(
        &self,
        kind: ActivityKind,
        since: Option<DateTime<Utc>>,
    ) -> Result<AssociationCounts, DatabaseError>;
    /// Per-day totals since `since`, newest day first.
    async fn daily_association_counts(
        &self,
        kind: ActivityKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyAssociation>, DatabaseError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit_entry(&self, entry: &AuditEntry) -> Result<i64, DatabaseError>;
    async fn list_audit_entries(
        &self,
        query: &AuditQuery,
    ) -> Result<Vec<StoredAuditEntry>, DatabaseError>;
    async fn count_audit_entries_since(&self, since: DateTime<Utc>)
    -> Result<u64, DatabaseError>;
}

#[async_trait]
pub trait SystemConfigStore: Send + Sync {
    async fn get_config(&self, key: &str) -> Result<Option<ConfigEntry>, DatabaseError>;
    /// Atomically replace the value of `key` only if it currently holds
    /// `expected` (`None` meaning "no row yet"). Returns whether the write
    /// landed.
    async fn compare_and_set_config(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, DatabaseError>;
    /// Unconditional upsert.
    async fn put_config(&self, key: &str, value: &str) -> Result<(), DatabaseError>;
}

/// Backend-agnostic database supertrait.
#[async_trait]
pub trait Database:
    CaseStore + ActivityStore + AuditStore + SystemConfigStore + Send + Sync
{
    /// Run schema migrations for this backend.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;
}
