//! Tamper-evident audit ledger.
//!
//! Every entry carries a SHA-256 checksum over its substantive fields
//! (actor, role, case key, action, entity, metadata, timestamp), serialized
//! in a fixed field order with object keys sorted. Re-computing the checksum
//! from stored fields exposes any later mutation.
//!
//! Writes are best-effort: [`AuditLedger::record`] detaches the insert onto
//! the runtime and returns immediately. A failed write produces a local
//! warning and nothing else; the audited operation has already succeeded.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::task::JoinHandle;

use crate::db::{AuditQuery, AuditStore};
use crate::enterprise::case_id::CorrelationKey;
use crate::enterprise::rbac::Actor;
use crate::enterprise::types::{AuditAction, Role};
use crate::error::{AuditError, DatabaseError};

/// Network/client origin of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Immutable, checksummed ledger record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor_id: i64,
    pub actor_role: Role,
    pub case_key: Option<CorrelationKey>,
    pub action: AuditAction,
    pub entity: String,
    pub metadata: Value,
    pub timestamp: DateTime<Utc>,
    pub checksum: String,
    #[serde(flatten)]
    pub provenance: Provenance,
}

/// An audit event before it is timestamped and sealed.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub actor_id: i64,
    pub actor_role: Role,
    pub case_key: Option<CorrelationKey>,
    pub action: AuditAction,
    pub entity: String,
    pub metadata: Value,
    pub provenance: Provenance,
}

impl NewAuditEntry {
    pub fn new(actor: &Actor, action: AuditAction, entity: &str) -> Self {
        Self {
            actor_id: actor.user_id,
            actor_role: actor.role,
            case_key: None,
            action,
            entity: entity.to_string(),
            metadata: Value::Object(serde_json::Map::new()),
            provenance: actor.provenance.clone(),
        }
    }

    pub fn with_case(mut self, key: CorrelationKey) -> Self {
        self.case_key = Some(key);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Serialize)]
struct ChecksumFields<'a> {
    actor_id: i64,
    role: &'static str,
    case_uuid: Option<String>,
    action: &'static str,
    entity: &'a str,
    metadata: Value,
    timestamp: String,
}

/// Rebuild `value` with object keys inserted in sorted order, so the
/// serialization does not depend on how the caller built the map.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for key in keys {
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[allow(clippy::too_many_arguments)]
fn compute_checksum(
    actor_id: i64,
    role: Role,
    case_key: Option<CorrelationKey>,
    action: AuditAction,
    entity: &str,
    metadata: &Value,
    timestamp: &DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    let fields = ChecksumFields {
        actor_id,
        role: role.as_str(),
        case_uuid: case_key.map(|k| k.to_string()),
        action: action.as_str(),
        entity,
        metadata: canonicalize(metadata),
        timestamp: timestamp.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
    };
    let serialized = serde_json::to_string(&fields)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

impl AuditEntry {
    /// Timestamp and checksum an event.
    ///
    /// The timestamp is truncated to microseconds, the precision it is
    /// persisted at, so a stored entry re-verifies.
    pub fn seal(entry: NewAuditEntry, at: DateTime<Utc>) -> Result<Self, AuditError> {
        let timestamp = at.trunc_subsecs(6);
        let checksum = compute_checksum(
            entry.actor_id,
            entry.actor_role,
            entry.case_key,
            entry.action,
            &entry.entity,
            &entry.metadata,
            &timestamp,
        )?;
        Ok(Self {
            actor_id: entry.actor_id,
            actor_role: entry.actor_role,
            case_key: entry.case_key,
            action: entry.action,
            entity: entry.entity,
            metadata: entry.metadata,
            timestamp,
            checksum,
            provenance: entry.provenance,
        })
    }

    /// Whether the stored checksum still matches the substantive fields.
    pub fn verify(&self) -> bool {
        match compute_checksum(
            self.actor_id,
            self.actor_role,
            self.case_key,
            self.action,
            &self.entity,
            &self.metadata,
            &self.timestamp,
        ) {
            Ok(expected) => expected.as_bytes().ct_eq(self.checksum.as_bytes()).into(),
            Err(_) => false,
        }
    }
}

/// Handle to a detached ledger write. Dropping it does not cancel the write.
#[derive(Debug)]
pub struct AuditReceipt {
    handle: Option<JoinHandle<()>>,
}

impl AuditReceipt {
    fn skipped() -> Self {
        Self { handle: None }
    }

    pub fn is_scheduled(&self) -> bool {
        self.handle.is_some()
    }

    /// Wait for the detached write to finish, whatever its outcome.
    pub async fn settle(self) {
        if let Some(handle) = self.handle {
            let _ = handle.await;
        }
    }
}

/// Result of an on-demand integrity scan. Nothing is repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub checked: usize,
    pub tampered: Vec<i64>,
}

impl IntegrityReport {
    pub fn is_intact(&self) -> bool {
        self.tampered.is_empty()
    }
}

#[derive(Clone)]
pub struct AuditLedger {
    store: Option<Arc<dyn AuditStore>>,
}

impl AuditLedger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A ledger that records nothing.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Seal `entry` and append it without blocking the caller.
    pub fn record(&self, entry: NewAuditEntry) -> AuditReceipt {
        let Some(store) = self.store.clone() else {
            return AuditReceipt::skipped();
        };

        let action = entry.action;
        let sealed = match AuditEntry::seal(entry, Utc::now()) {
            Ok(sealed) => sealed,
            Err(e) => {
                tracing::warn!(action = %action, "Failed to seal audit event: {}", e);
                return AuditReceipt::skipped();
            }
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(action = %action, "No runtime to write audit event: {}", e);
                return AuditReceipt::skipped();
            }
        };

        let handle = runtime.spawn(async move {
            if let Err(e) = store.append_audit_entry(&sealed).await {
                let e = AuditError::from(e);
                tracing::warn!(action = %sealed.action, actor_id = sealed.actor_id, "{}", e);
            }
        });
        AuditReceipt {
            handle: Some(handle),
        }
    }

    /// Re-verify stored entries matching `query`.
    pub async fn verify_stored(&self, query: &AuditQuery) -> Result<IntegrityReport, DatabaseError> {
        let Some(store) = &self.store else {
            return Ok(IntegrityReport::default());
        };
        let entries = store.list_audit_entries(query).await?;
        let tampered = entries
            .iter()
            .filter(|stored| !stored.entry.verify())
            .map(|stored| stored.id)
            .collect::<Vec<_>>();
        if !tampered.is_empty() {
            tracing::warn!(count = tampered.len(), "Audit entries failed checksum verification");
        }
        Ok(IntegrityReport {
            checked: entries.len(),
            tampered,
        })
    }

    /// Number of entries recorded since `since`.
    pub async fn activity_since(&self, since: DateTime<Utc>) -> Result<u64, DatabaseError> {
        match &self.store {
            Some(store) => store.count_audit_entries_since(since).await,
            None => Ok(0),
        }
    }
}

/// Free-function form of [`AuditEntry::verify`].
pub fn verify(entry: &AuditEntry) -> bool {
    entry.verify()
}
