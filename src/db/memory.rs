//! In-process stores for the narrow sub-traits.
//!
//! Used by unit tests and by embedders that want the phase controller or
//! audit ledger without a database file.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::db::{AuditQuery, AuditStore, ConfigEntry, StoredAuditEntry, SystemConfigStore};
use crate::enterprise::audit::AuditEntry;
use crate::error::DatabaseError;

fn poisoned(what: &str, e: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::Pool(format!("{what} lock poisoned: {e}"))
}

#[derive(Default)]
pub struct MemoryConfigStore {
    entries: Mutex<HashMap<String, ConfigEntry>>,
    contended: AtomicBool,
}

impl MemoryConfigStore {
    /// While set, every compare-and-set loses as if another writer won.
    pub fn set_contended(&self, contended: bool) {
        self.contended.store(contended, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl SystemConfigStore for MemoryConfigStore {
    async fn get_config(&self, key: &str) -> Result<Option<ConfigEntry>, DatabaseError> {
        let entries = self.entries.lock().map_err(|e| poisoned("config", e))?;
        Ok(entries.get(key).cloned())
    }

    async fn compare_and_set_config(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, DatabaseError> {
        if self.contended.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let mut entries = self.entries.lock().map_err(|e| poisoned("config", e))?;
        let current = entries.get(key).map(|entry| entry.value.as_str());
        if current != expected {
            return Ok(false);
        }
        let version = entries.get(key).map(|entry| entry.version + 1).unwrap_or(1);
        entries.insert(
            key.to_string(),
            ConfigEntry {
                key: key.to_string(),
                value: value.to_string(),
                version,
                updated_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn put_config(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let mut entries = self.entries.lock().map_err(|e| poisoned("config", e))?;
        let version = entries.get(key).map(|entry| entry.version + 1).unwrap_or(1);
        entries.insert(
            key.to_string(),
            ConfigEntry {
                key: key.to_string(),
                value: value.to_string(),
                version,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }
}

/// Append-only audit store. Row ids start at 1.
#[derive(Default)]
pub struct MemoryAuditStore {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditStore {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Mutate a stored row in place, bypassing the ledger.
    pub fn tamper(&self, id: i64, edit: impl FnOnce(&mut AuditEntry)) {
        if let Ok(mut entries) = self.entries.lock()
            && let Some(entry) = usize::try_from(id - 1)
                .ok()
                .and_then(|idx| entries.get_mut(idx))
        {
            edit(entry);
        }
    }
}

#[async_trait::async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append_audit_entry(&self, entry: &AuditEntry) -> Result<i64, DatabaseError> {
        let mut entries = self.entries.lock().map_err(|e| poisoned("audit", e))?;
        entries.push(entry.clone());
        Ok(entries.len() as i64)
    }

    async fn list_audit_entries(
        &self,
        query: &AuditQuery,
    ) -> Result<Vec<StoredAuditEntry>, DatabaseError> {
        let entries = self.entries.lock().map_err(|e| poisoned("audit", e))?;
        let matching = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| query.since.is_none_or(|since| entry.timestamp >= since))
            .filter(|(_, entry)| query.case_key.is_none_or(|key| entry.case_key == Some(key)))
            .filter(|(_, entry)| query.action.is_none_or(|action| entry.action == action))
            .map(|(idx, entry)| StoredAuditEntry {
                id: idx as i64 + 1,
                entry: entry.clone(),
            });
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn count_audit_entries_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let entries = self.entries.lock().map_err(|e| poisoned("audit", e))?;
        Ok(entries.iter().filter(|entry| entry.timestamp >= since).count() as u64)
    }
}
