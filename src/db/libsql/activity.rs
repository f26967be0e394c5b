use chrono::{DateTime, NaiveDate, Utc};
use libsql::params;

use crate::db::{
    ActivityKind, ActivityStore, AssociationCounts, DailyAssociation, DocumentRecord,
    NewDocumentParams, NewMessageParams,
};
use crate::enterprise::case_id::CorrelationKey;
use crate::error::DatabaseError;

use super::{
    LibSqlBackend, fmt_ts, get_count, get_i64, get_opt_text, get_text, get_ts, opt_text,
    opt_text_owned,
};

fn key_value(key: Option<CorrelationKey>) -> libsql::Value {
    opt_text_owned(key.map(|k| k.to_string()))
}

#[async_trait::async_trait]
impl ActivityStore for LibSqlBackend {
    async fn insert_message(&self, input: &NewMessageParams) -> Result<i64, DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO chat_messages \
             (case_uuid, case_id, sender_id, sender_role, content, is_internal_note, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                key_value(input.case_key),
                opt_text(input.display_id.as_deref()),
                input.sender_id,
                input.sender_role.as_str(),
                input.content.as_str(),
                i64::from(input.is_internal_note),
                fmt_ts(&input.created_at),
            ],
        )
        .await?;
        Ok(conn.last_insert_rowid())
    }

    async fn insert_document(&self, input: &NewDocumentParams) -> Result<i64, DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO documents \
             (case_uuid, case_id, uploaded_by, file_name, document_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key_value(input.case_key),
                opt_text(input.display_id.as_deref()),
                input.uploaded_by,
                input.file_name.as_str(),
                opt_text(input.document_hash.as_deref()),
                fmt_ts(&input.created_at),
            ],
        )
        .await?;
        Ok(conn.last_insert_rowid())
    }

    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                "SELECT id, case_uuid, case_id, uploaded_by, file_name, document_hash, created_at \
                 FROM documents WHERE id = ?1 LIMIT 1",
                params![id],
            )
            .await?
            .next()
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let case_key = match get_opt_text(&row, 1) {
            Some(raw) => Some(CorrelationKey::parse(&raw).ok_or_else(|| {
                DatabaseError::Serialization(format!("invalid documents.case_uuid '{}'", raw))
            })?),
            None => None,
        };
        Ok(Some(DocumentRecord {
            id: get_i64(&row, 0),
            case_key,
            display_id: get_opt_text(&row, 2),
            uploaded_by: get_i64(&row, 3),
            file_name: get_text(&row, 4),
            document_hash: get_opt_text(&row, 5),
            created_at: get_ts(&row, 6)?,
        }))
    }

    async fn count_case_activity(
        &self,
        kind: ActivityKind,
        key: CorrelationKey,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!("SELECT COUNT(*) FROM {} WHERE case_uuid = ?1", kind.table()),
                params![key.to_string()],
            )
            .await?
            .next()
            .await?;
        Ok(row.map(|row| get_count(&row, 0)).unwrap_or(0))
    }

    async fn association_counts(
        &self,
        kind: ActivityKind,
        since: Option<DateTime<Utc>>,
    ) -> Result<AssociationCounts, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = match since {
            Some(since) => {
                conn.query(
                    &format!(
                        "SELECT COUNT(*), COUNT(case_uuid) FROM {} WHERE created_at >= ?1",
                        kind.table()
                    ),
                    params![fmt_ts(&since)],
                )
                .await?
            }
            None => {
                conn.query(
                    &format!("SELECT COUNT(*), COUNT(case_uuid) FROM {}", kind.table()),
                    (),
                )
                .await?
            }
        };

        Ok(match rows.next().await? {
            Some(row) => AssociationCounts {
                total: get_count(&row, 0),
                associated: get_count(&row, 1),
            },
            None => AssociationCounts::default(),
        })
    }

    async fn daily_association_counts(
        &self,
        kind: ActivityKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyAssociation>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT substr(created_at, 1, 10) AS day, COUNT(*), COUNT(case_uuid) \
                     FROM {} WHERE created_at >= ?1 GROUP BY day ORDER BY day DESC",
                    kind.table()
                ),
                params![fmt_ts(&since)],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let raw = get_text(&row, 0);
            let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                DatabaseError::Serialization(format!("invalid activity day '{}': {}", raw, e))
            })?;
            out.push(DailyAssociation {
                date,
                total: get_count(&row, 1),
                associated: get_count(&row, 2),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::db::libsql::test_support::setup_backend;
    use crate::db::{CaseStore, NewCaseParams};
    use crate::enterprise::case_id;
    use crate::enterprise::types::{CaseStatus, PracticeArea, Role};

    fn message(case_key: Option<CorrelationKey>, at: DateTime<Utc>) -> NewMessageParams {
        NewMessageParams {
            case_key,
            display_id: None,
            sender_id: 1,
            sender_role: Role::Lawyer,
            content: "hello".to_string(),
            is_internal_note: false,
            created_at: at,
        }
    }

    async fn seed_case(backend: &LibSqlBackend) -> CorrelationKey {
        let identifier = case_id::generate(PracticeArea::Family);
        let key = identifier.correlation_key;
        backend
            .insert_case(&NewCaseParams {
                identifier,
                title: "Seed".to_string(),
                description: None,
                practice_area: PracticeArea::Family,
                status: CaseStatus::Open,
                client_id: Some(2),
                assigned_lawyer_id: Some(1),
                sla_deadline: None,
                created_by: 1,
            })
            .await
            .expect("seed case");
        key
    }

    #[tokio::test]
    async fn association_counts_split_linked_and_unlinked_items() {
        let fixture = setup_backend().await;
        let key = seed_case(&fixture.backend).await;
        let now = Utc::now();

        fixture.backend.insert_message(&message(Some(key), now)).await.unwrap();
        fixture.backend.insert_message(&message(None, now)).await.unwrap();
        fixture.backend.insert_message(&message(None, now)).await.unwrap();

        let counts = fixture
            .backend
            .association_counts(ActivityKind::Message, None)
            .await
            .unwrap();
        assert_eq!(counts, AssociationCounts { total: 3, associated: 1 });

        let documents = fixture
            .backend
            .association_counts(ActivityKind::Document, None)
            .await
            .unwrap();
        assert_eq!(documents, AssociationCounts::default());
    }

    #[tokio::test]
    async fn daily_counts_group_by_day_newest_first() {
        let fixture = setup_backend().await;
        let key = seed_case(&fixture.backend).await;
        let day_one = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let day_two = day_one + Duration::days(1);

        fixture.backend.insert_message(&message(Some(key), day_one)).await.unwrap();
        fixture.backend.insert_message(&message(None, day_one)).await.unwrap();
        fixture.backend.insert_message(&message(Some(key), day_two)).await.unwrap();
        fixture
            .backend
            .insert_message(&message(None, day_one - Duration::days(10)))
            .await
            .unwrap();

        let trend = fixture
            .backend
            .daily_association_counts(ActivityKind::Message, day_one - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].date, day_two.date_naive());
        assert_eq!((trend[0].total, trend[0].associated), (1, 1));
        assert_eq!((trend[1].total, trend[1].associated), (2, 1));
    }

    #[tokio::test]
    async fn deleting_a_case_cascades_to_its_activity() {
        let fixture = setup_backend().await;
        let key = seed_case(&fixture.backend).await;
        let now = Utc::now();
        fixture.backend.insert_message(&message(Some(key), now)).await.unwrap();
        let doc_id = fixture
            .backend
            .insert_document(&NewDocumentParams {
                case_key: Some(key),
                display_id: None,
                uploaded_by: 1,
                file_name: "retainer.pdf".to_string(),
                document_hash: None,
                created_at: now,
            })
            .await
            .unwrap();
        assert!(fixture.backend.get_document(doc_id).await.unwrap().is_some());

        assert!(fixture.backend.delete_case(key).await.unwrap());
        assert_eq!(
            fixture
                .backend
                .count_case_activity(ActivityKind::Message, key)
                .await
                .unwrap(),
            0
        );
        assert!(fixture.backend.get_document(doc_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn linking_to_an_unknown_case_is_rejected() {
        let fixture = setup_backend().await;
        let err = fixture
            .backend
            .insert_message(&message(Some(CorrelationKey::new_random()), Utc::now()))
            .await
            .expect_err("foreign key must hold");
        assert!(err.to_string().contains("FOREIGN KEY"), "got {err}");
    }
}
