use chrono::Utc;
use libsql::params;

use crate::db::{ConfigEntry, SystemConfigStore};
use crate::error::DatabaseError;

use super::{LibSqlBackend, fmt_ts, get_i64, get_text, get_ts};

#[async_trait::async_trait]
impl SystemConfigStore for LibSqlBackend {
    async fn get_config(&self, key: &str) -> Result<Option<ConfigEntry>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                "SELECT key, value, version, updated_at FROM system_config WHERE key = ?1",
                params![key],
            )
            .await?
            .next()
            .await?;
        match row {
            Some(row) => Ok(Some(ConfigEntry {
                key: get_text(&row, 0),
                value: get_text(&row, 1),
                version: get_i64(&row, 2),
                updated_at: get_ts(&row, 3)?,
            })),
            None => Ok(None),
        }
    }

    async fn compare_and_set_config(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, DatabaseError> {
        let now = fmt_ts(&Utc::now());
        let conn = self.connect().await?;
        let affected = match expected {
            None => {
                conn.execute(
                    "INSERT INTO system_config (key, value, version, created_at, updated_at) \
                     VALUES (?1, ?2, 1, ?3, ?3) \
                     ON CONFLICT(key) DO NOTHING",
                    params![key, value, now],
                )
                .await?
            }
            Some(expected) => {
                conn.execute(
                    "UPDATE system_config \
                     SET value = ?3, version = version + 1, updated_at = ?4 \
                     WHERE key = ?1 AND value = ?2",
                    params![key, expected, value, now],
                )
                .await?
            }
        };
        Ok(affected == 1)
    }

    async fn put_config(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let now = fmt_ts(&Utc::now());
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO system_config (key, value, version, created_at, updated_at) \
             VALUES (?1, ?2, 1, ?3, ?3) \
             ON CONFLICT(key) DO UPDATE SET \
                value = excluded.value, \
                version = system_config.version + 1, \
                updated_at = excluded.updated_at",
            params![key, value, now],
        )
        .await?;
        Ok(())
    }
}
