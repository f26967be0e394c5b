use chrono::{DateTime, Utc};
use libsql::params;

use crate::db::{AuditQuery, AuditStore, StoredAuditEntry};
use crate::enterprise::audit::{AuditEntry, Provenance};
use crate::enterprise::case_id::CorrelationKey;
use crate::enterprise::types::{AuditAction, Role};
use crate::error::DatabaseError;

use super::{
    LibSqlBackend, fmt_ts, get_count, get_i64, get_opt_text, get_text, get_ts, opt_text,
    opt_text_owned,
};

fn row_to_stored_entry(row: &libsql::Row) -> Result<StoredAuditEntry, DatabaseError> {
    let id = get_i64(row, 0);

    let raw_role = get_text(row, 2);
    let actor_role = Role::from_db_value(&raw_role).ok_or_else(|| {
        DatabaseError::Serialization(format!("audit_logs[{id}]: unknown role '{raw_role}'"))
    })?;

    let case_key = match get_opt_text(row, 3) {
        Some(raw) => Some(CorrelationKey::parse(&raw).ok_or_else(|| {
            DatabaseError::Serialization(format!("audit_logs[{id}]: invalid case_uuid '{raw}'"))
        })?),
        None => None,
    };

    let raw_action = get_text(row, 4);
    let action = AuditAction::from_db_value(&raw_action).ok_or_else(|| {
        DatabaseError::Serialization(format!("audit_logs[{id}]: unknown action '{raw_action}'"))
    })?;

    let metadata = serde_json::from_str(&get_text(row, 6)).map_err(|e| {
        DatabaseError::Serialization(format!("audit_logs[{id}]: invalid metadata: {e}"))
    })?;

    Ok(StoredAuditEntry {
        id,
        entry: AuditEntry {
            actor_id: get_i64(row, 1),
            actor_role,
            case_key,
            action,
            entity: get_text(row, 5),
            metadata,
            timestamp: get_ts(row, 7)?,
            checksum: get_text(row, 8),
            provenance: Provenance {
                ip_address: get_opt_text(row, 9),
                user_agent: get_opt_text(row, 10),
            },
        },
    })
}

#[async_trait::async_trait]
impl AuditStore for LibSqlBackend {
    async fn append_audit_entry(&self, entry: &AuditEntry) -> Result<i64, DatabaseError> {
        let metadata = serde_json::to_string(&entry.metadata)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO audit_logs \
             (actor_id, actor_role, case_uuid, action, entity, metadata, timestamp, checksum, \
              ip_address, user_agent) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.actor_id,
                entry.actor_role.as_str(),
                opt_text_owned(entry.case_key.map(|k| k.to_string())),
                entry.action.as_str(),
                entry.entity.as_str(),
                metadata,
                fmt_ts(&entry.timestamp),
                entry.checksum.as_str(),
                opt_text(entry.provenance.ip_address.as_deref()),
                opt_text(entry.provenance.user_agent.as_deref()),
            ],
        )
        .await?;
        Ok(conn.last_insert_rowid())
    }

    async fn list_audit_entries(
        &self,
        query: &AuditQuery,
    ) -> Result<Vec<StoredAuditEntry>, DatabaseError> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = query
            .limit
            .and_then(|l| i64::try_from(l).ok())
            .unwrap_or(-1);
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT id, actor_id, actor_role, case_uuid, action, entity, metadata, \
                        timestamp, checksum, ip_address, user_agent \
                 FROM audit_logs \
                 WHERE (?1 IS NULL OR timestamp >= ?1) \
                   AND (?2 IS NULL OR case_uuid = ?2) \
                   AND (?3 IS NULL OR action = ?3) \
                 ORDER BY id ASC \
                 LIMIT ?4",
                params![
                    opt_text_owned(query.since.as_ref().map(fmt_ts)),
                    opt_text_owned(query.case_key.map(|k| k.to_string())),
                    opt_text(query.action.map(|a| a.as_str())),
                    limit,
                ],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_stored_entry(&row)?);
        }
        Ok(out)
    }

    async fn count_audit_entries_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                "SELECT COUNT(*) FROM audit_logs WHERE timestamp >= ?1",
                params![fmt_ts(&since)],
            )
            .await?
            .next()
            .await?;
        Ok(row.map(|row| get_count(&row, 0)).unwrap_or(0))
    }
}
