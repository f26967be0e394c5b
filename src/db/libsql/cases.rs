use chrono::{DateTime, Utc};
use libsql::{Connection, params};

use crate::db::{
    CaseFilter, CaseIdentifierStats, CaseRecord, CaseStore, LegacyCaseParams, MigratedCaseUpdate,
    NewCaseParams,
};
use crate::enterprise::case_id::CorrelationKey;
use crate::enterprise::migration::RollbackEntry;
use crate::enterprise::types::{CaseStatus, PracticeArea};
use crate::error::DatabaseError;

use super::{
    LibSqlBackend, fmt_ts, get_count, get_i64, get_opt_i64, get_opt_text, get_opt_ts, get_text,
    get_ts, opt_i64, opt_text, opt_text_owned,
};

const CASE_COLUMNS: &str = "id, case_uuid, secure_case_id, case_number, legacy_case_number, type, \
     title, practice_area, status, client_id, assigned_lawyer_id, sla_deadline, last_activity_at, \
     created_by, updated_by, created_at, updated_at";

fn parse_correlation_key(raw: Option<String>) -> Result<Option<CorrelationKey>, DatabaseError> {
    raw.map(|value| {
        CorrelationKey::parse(&value).ok_or_else(|| {
            DatabaseError::Serialization(format!("invalid case_uuid '{}'", value))
        })
    })
    .transpose()
}

fn parse_practice_area(raw: Option<String>) -> Result<Option<PracticeArea>, DatabaseError> {
    raw.map(|value| {
        PracticeArea::from_db_value(&value).ok_or_else(|| {
            DatabaseError::Serialization(format!("invalid practice_area '{}'", value))
        })
    })
    .transpose()
}

fn row_to_case_record(row: &libsql::Row) -> Result<CaseRecord, DatabaseError> {
    Ok(CaseRecord {
        id: get_i64(row, 0),
        correlation_key: parse_correlation_key(get_opt_text(row, 1))?,
        display_id: get_opt_text(row, 2),
        case_number: get_opt_text(row, 3),
        legacy_case_number: get_opt_text(row, 4),
        case_type: get_opt_text(row, 5),
        title: get_text(row, 6),
        practice_area: parse_practice_area(get_opt_text(row, 7))?,
        status: get_text(row, 8),
        client_id: get_opt_i64(row, 9),
        assigned_lawyer_id: get_opt_i64(row, 10),
        sla_deadline: get_opt_ts(row, 11)?,
        last_activity_at: get_opt_ts(row, 12)?,
        created_by: get_opt_i64(row, 13),
        updated_by: get_opt_i64(row, 14),
        created_at: get_ts(row, 15)?,
        updated_at: get_ts(row, 16)?,
    })
}

async fn collect_cases(mut rows: libsql::Rows) -> Result<Vec<CaseRecord>, DatabaseError> {
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_case_record(&row)?);
    }
    Ok(out)
}

async fn fetch_case_by_id(conn: &Connection, id: i64) -> Result<Option<CaseRecord>, DatabaseError> {
    let row = conn
        .query(
            &format!("SELECT {CASE_COLUMNS} FROM cases WHERE id = ?1 LIMIT 1"),
            params![id],
        )
        .await?
        .next()
        .await?;
    row.map(|row| row_to_case_record(&row)).transpose()
}

#[async_trait::async_trait]
impl CaseStore for LibSqlBackend {
    async fn insert_case(&self, input: &NewCaseParams) -> Result<CaseRecord, DatabaseError> {
        let conn = self.connect().await?;
        let now = fmt_ts(&Utc::now());
        conn.execute(
            "INSERT INTO cases \
             (case_uuid, secure_case_id, title, description, practice_area, status, client_id, \
              assigned_lawyer_id, sla_deadline, last_activity_at, created_by, updated_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11, ?10, ?10)",
            params![
                input.identifier.correlation_key.to_string(),
                input.identifier.display_id.as_str(),
                input.title.trim(),
                opt_text(input.description.as_deref()),
                input.practice_area.as_str(),
                input.status.as_str(),
                opt_i64(input.client_id),
                opt_i64(input.assigned_lawyer_id),
                opt_text_owned(input.sla_deadline.as_ref().map(fmt_ts)),
                now.as_str(),
                input.created_by,
            ],
        )
        .await?;

        let id = conn.last_insert_rowid();
        fetch_case_by_id(&conn, id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "case".to_string(),
                id: id.to_string(),
            })
    }

    async fn insert_legacy_case(&self, input: &LegacyCaseParams) -> Result<i64, DatabaseError> {
        let conn = self.connect().await?;
        let now = fmt_ts(&Utc::now());
        conn.execute(
            "INSERT INTO cases \
             (case_number, type, title, status, client_id, assigned_lawyer_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                opt_text(input.case_number.as_deref()),
                opt_text(input.case_type.as_deref()),
                input.title.as_str(),
                input.status.as_deref().unwrap_or("pending"),
                opt_i64(input.client_id),
                opt_i64(input.assigned_lawyer_id),
                now.as_str(),
            ],
        )
        .await?;
        Ok(conn.last_insert_rowid())
    }

    async fn get_case_by_id(&self, id: i64) -> Result<Option<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        fetch_case_by_id(&conn, id).await
    }

    async fn get_case_by_key(
        &self,
        key: CorrelationKey,
    ) -> Result<Option<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!("SELECT {CASE_COLUMNS} FROM cases WHERE case_uuid = ?1 LIMIT 1"),
                params![key.to_string()],
            )
            .await?
            .next()
            .await?;
        row.map(|row| row_to_case_record(&row)).transpose()
    }

    async fn get_case_by_display_id(
        &self,
        display_id: &str,
    ) -> Result<Option<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!("SELECT {CASE_COLUMNS} FROM cases WHERE secure_case_id = ?1 LIMIT 1"),
                params![display_id],
            )
            .await?
            .next()
            .await?;
        row.map(|row| row_to_case_record(&row)).transpose()
    }

    async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let rows = match (filter.assigned_lawyer_id, filter.client_id) {
            (Some(lawyer), Some(client)) => {
                conn.query(
                    &format!(
                        "SELECT {CASE_COLUMNS} FROM cases \
                         WHERE assigned_lawyer_id = ?1 AND client_id = ?2 ORDER BY id"
                    ),
                    params![lawyer, client],
                )
                .await?
            }
            (Some(lawyer), None) => {
                conn.query(
                    &format!(
                        "SELECT {CASE_COLUMNS} FROM cases WHERE assigned_lawyer_id = ?1 ORDER BY id"
                    ),
                    params![lawyer],
                )
                .await?
            }
            (None, Some(client)) => {
                conn.query(
                    &format!("SELECT {CASE_COLUMNS} FROM cases WHERE client_id = ?1 ORDER BY id"),
                    params![client],
                )
                .await?
            }
            (None, None) => {
                conn.query(&format!("SELECT {CASE_COLUMNS} FROM cases ORDER BY id"), ())
                    .await?
            }
        };
        collect_cases(rows).await
    }

    async fn list_legacy_cases(&self) -> Result<Vec<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {CASE_COLUMNS} FROM cases \
                     WHERE secure_case_id IS NULL OR case_uuid IS NULL ORDER BY id"
                ),
                (),
            )
            .await?;
        collect_cases(rows).await
    }

    async fn apply_migration(&self, update: &MigratedCaseUpdate) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        let affected = conn
            .execute(
                "UPDATE cases SET case_uuid = ?1, secure_case_id = ?2, legacy_case_number = ?3, \
                 practice_area = ?4, status = ?5, updated_at = ?6 WHERE id = ?7",
                params![
                    update.identifier.correlation_key.to_string(),
                    update.identifier.display_id.as_str(),
                    opt_text(update.legacy_case_number.as_deref()),
                    update.practice_area.as_str(),
                    update.status.as_str(),
                    fmt_ts(&Utc::now()),
                    update.id,
                ],
            )
            .await?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "case".to_string(),
                id: update.id.to_string(),
            });
        }
        Ok(())
    }

    async fn revert_migration(&self, entry: &RollbackEntry) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        let affected = conn
            .execute(
                "UPDATE cases SET case_number = ?1, type = ?2, status = COALESCE(?3, status), \
                 case_uuid = ?4, secure_case_id = ?5, legacy_case_number = NULL, \
                 practice_area = NULL, updated_at = ?6 WHERE id = ?7",
                params![
                    opt_text(entry.original_case_number.as_deref()),
                    opt_text(entry.original_type.as_deref()),
                    opt_text(entry.original_status.as_deref()),
                    opt_text_owned(entry.original_case_key.map(|k| k.to_string())),
                    opt_text(entry.original_display_id.as_deref()),
                    fmt_ts(&Utc::now()),
                    entry.id,
                ],
            )
            .await?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "case".to_string(),
                id: entry.id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_case_status(
        &self,
        key: CorrelationKey,
        status: CaseStatus,
        updated_by: i64,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let ts = fmt_ts(&at);
        let affected = conn
            .execute(
                "UPDATE cases SET status = ?1, updated_by = ?2, updated_at = ?3, last_activity_at = ?3 \
                 WHERE case_uuid = ?4",
                params![status.as_str(), updated_by, ts.as_str(), key.to_string()],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn touch_case_activity(
        &self,
        key: CorrelationKey,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            "UPDATE cases SET last_activity_at = ?1 WHERE case_uuid = ?2",
            params![fmt_ts(&at), key.to_string()],
        )
        .await?;
        Ok(())
    }

    async fn delete_case(&self, key: CorrelationKey) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let affected = conn
            .execute(
                "DELETE FROM cases WHERE case_uuid = ?1",
                params![key.to_string()],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn case_identifier_stats(&self) -> Result<CaseIdentifierStats, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                "SELECT \
                   (SELECT COUNT(*) FROM cases), \
                   (SELECT COUNT(*) FROM cases WHERE secure_case_id IS NOT NULL AND case_uuid IS NOT NULL), \
                   (SELECT COUNT(*) FROM (SELECT secure_case_id FROM cases WHERE secure_case_id IS NOT NULL \
                      GROUP BY secure_case_id HAVING COUNT(*) > 1)), \
                   (SELECT COUNT(*) FROM cases WHERE secure_case_id IS NOT NULL AND case_uuid IS NULL)",
                (),
            )
            .await?
            .next()
            .await?
            .ok_or_else(|| DatabaseError::Query("identifier stats returned no row".to_string()))?;

        Ok(CaseIdentifierStats {
            total_cases: get_count(&row, 0),
            migrated_cases: get_count(&row, 1),
            duplicate_display_ids: get_count(&row, 2),
            missing_correlation_keys: get_count(&row, 3),
        })
    }

    async fn list_display_ids(&self) -> Result<Vec<String>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT secure_case_id FROM cases WHERE secure_case_id IS NOT NULL ORDER BY id",
                (),
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(get_text(&row, 0));
        }
        Ok(out)
    }
}
