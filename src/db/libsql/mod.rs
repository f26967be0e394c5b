//! libSQL backend.
//!
//! One `libsql::Database` handle is shared; every operation opens its own
//! connection with foreign keys enabled so `ON DELETE CASCADE` holds.

mod activity;
mod audit;
mod cases;
mod config;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use libsql::{Builder, Connection, Value};

use crate::db::Database;
use crate::db::libsql_migrations::SCHEMA;
use crate::error::DatabaseError;

#[derive(Clone)]
pub struct LibSqlBackend {
    db: Arc<libsql::Database>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("failed to create database dir {:?}: {}", parent, e))
            })?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("failed to open {:?}: {}", path, e)))?;
        Ok(Self { db: Arc::new(db) })
    }

    pub async fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        Ok(conn)
    }
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        tracing::debug!("libSQL schema is up to date");
        Ok(())
    }
}

// ==================== Row helpers ====================

/// Fixed-width UTC timestamps so lexical order matches chronological order.
pub(crate) fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc()))
}

pub(crate) fn get_text(row: &libsql::Row, idx: i32) -> String {
    row.get::<String>(idx).unwrap_or_default()
}

pub(crate) fn get_opt_text(row: &libsql::Row, idx: i32) -> Option<String> {
    match row.get_value(idx) {
        Ok(Value::Text(s)) => Some(s),
        _ => None,
    }
}

pub(crate) fn get_i64(row: &libsql::Row, idx: i32) -> i64 {
    row.get::<i64>(idx).unwrap_or_default()
}

pub(crate) fn get_opt_i64(row: &libsql::Row, idx: i32) -> Option<i64> {
    match row.get_value(idx) {
        Ok(Value::Integer(v)) => Some(v),
        _ => None,
    }
}

pub(crate) fn get_count(row: &libsql::Row, idx: i32) -> u64 {
    u64::try_from(get_i64(row, idx)).unwrap_or(0)
}

pub(crate) fn get_ts(row: &libsql::Row, idx: i32) -> Result<DateTime<Utc>, DatabaseError> {
    parse_timestamp(&get_text(row, idx)).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

pub(crate) fn get_opt_ts(
    row: &libsql::Row,
    idx: i32,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    match get_opt_text(row, idx) {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .map_err(|e| DatabaseError::Serialization(e.to_string())),
        None => Ok(None),
    }
}

pub(crate) fn opt_text(value: Option<&str>) -> Value {
    match value {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

pub(crate) fn opt_text_owned(value: Option<String>) -> Value {
    match value {
        Some(s) => Value::Text(s),
        None => Value::Null,
    }
}

pub(crate) fn opt_i64(value: Option<i64>) -> Value {
    match value {
        Some(v) => Value::Integer(v),
        None => Value::Null,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::LibSqlBackend;
    use crate::db::Database;

    pub(crate) struct TestBackend {
        pub backend: LibSqlBackend,
        _tmpdir: tempfile::TempDir,
    }

    pub(crate) async fn setup_backend() -> TestBackend {
        // Use a temp-file database so all connections share schema/state.
        let tmpdir = tempfile::tempdir().expect("tempdir");
        let db_path = tmpdir.path().join("enterprise_test.db");
        let backend = LibSqlBackend::new_local(&db_path)
            .await
            .expect("local backend should initialize");
        backend
            .run_migrations()
            .await
            .expect("migrations should succeed");
        TestBackend {
            backend,
            _tmpdir: tmpdir,
        }
    }
}
