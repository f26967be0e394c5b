//! Case desk: the request-level flow over identifiers, access policy,
//! phase gating and the audit ledger.
//!
//! Every case-scoped call validates the display identifier, checks the
//! actor's permission and case access, and only then touches the store.
//! Public views never expose the correlation key.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::{
    ActivityKind, CaseRecord, Database, DocumentRecord, NewCaseParams, NewDocumentParams,
    NewMessageParams,
};
use crate::enterprise::audit::{AuditLedger, NewAuditEntry};
use crate::enterprise::case_id::{self, MAX_MINT_ATTEMPTS};
use crate::enterprise::phase::{GatedAction, PhaseController};
use crate::enterprise::rbac::{self, Actor, require_permission};
use crate::enterprise::types::{AuditAction, CaseStatus, Permission, PracticeArea, Role};
use crate::error::{DatabaseError, EnterpriseError};

pub const DEFAULT_SLA_DAYS: u32 = 30;
/// Ten years.
pub const MAX_SLA_DAYS: u32 = 3650;

/// Deadline `days` from now, rejecting windows past [`MAX_SLA_DAYS`].
pub(crate) fn sla_deadline(days: u32) -> Result<DateTime<Utc>, EnterpriseError> {
    if days > MAX_SLA_DAYS {
        return Err(EnterpriseError::validation(
            "sla_days",
            format!("SLA may not exceed {MAX_SLA_DAYS} days"),
        ));
    }
    Utc::now()
        .checked_add_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| EnterpriseError::validation("sla_days", "SLA deadline is out of range"))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCaseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub practice_area: Option<String>,
    pub client_id: Option<i64>,
    pub sla_days: Option<u32>,
}

/// Client-facing projection of a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseView {
    pub case_id: String,
    pub title: String,
    pub practice_area: Option<PracticeArea>,
    pub status: String,
    pub legacy_case_number: Option<String>,
    pub client_id: Option<i64>,
    pub assigned_lawyer_id: Option<i64>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CaseView {
    fn from_record(record: CaseRecord) -> Self {
        Self {
            case_id: record.display_id.unwrap_or_default(),
            title: record.title,
            practice_area: record.practice_area,
            status: record.status,
            legacy_case_number: record.legacy_case_number,
            client_id: record.client_id,
            assigned_lawyer_id: record.assigned_lawyer_id,
            sla_deadline: record.sla_deadline,
            last_activity_at: record.last_activity_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDraft {
    pub case_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub is_internal_note: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentDraft {
    pub case_id: Option<String>,
    pub file_name: String,
    pub document_hash: Option<String>,
}

/// Result of a gated create. `warning` carries the soft-phase prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityOutcome {
    pub id: i64,
    pub case_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentView {
    pub id: i64,
    pub case_id: Option<String>,
    pub uploaded_by: i64,
    pub file_name: String,
    pub document_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DocumentRecord> for DocumentView {
    fn from(record: DocumentRecord) -> Self {
        Self {
            id: record.id,
            case_id: record.display_id,
            uploaded_by: record.uploaded_by,
            file_name: record.file_name,
            document_hash: record.document_hash,
            created_at: record.created_at,
        }
    }
}

pub struct CaseDesk {
    db: Arc<dyn Database>,
    phases: Arc<PhaseController>,
    ledger: AuditLedger,
    sla_days: u32,
}

impl CaseDesk {
    pub fn new(db: Arc<dyn Database>, phases: Arc<PhaseController>, ledger: AuditLedger) -> Self {
        Self {
            db,
            phases,
            ledger,
            sla_days: DEFAULT_SLA_DAYS,
        }
    }

    pub fn with_sla_days(mut self, sla_days: u32) -> Self {
        self.sla_days = sla_days;
        self
    }

    /// Identifier grammar, lookup, then access, in that order.
    async fn resolve_case(&self, actor: &Actor, display_id: &str) -> Result<CaseRecord, EnterpriseError> {
        let display_id = case_id::ensure_valid(display_id.trim())?;
        let case = self
            .db
            .get_case_by_display_id(display_id)
            .await?
            .ok_or_else(|| EnterpriseError::CaseNotFound(display_id.to_string()))?;
        if !rbac::case_access_decision(actor.user_id, actor.role, &case) {
            return Err(EnterpriseError::AccessDenied(format!(
                "user {} may not access case {}",
                actor.user_id, display_id
            )));
        }
        Ok(case)
    }

    pub async fn create_case(
        &self,
        actor: &Actor,
        request: NewCaseRequest,
    ) -> Result<CaseView, EnterpriseError> {
        require_permission(actor, Permission::EditCase)?;
        let practice_area: PracticeArea = request
            .practice_area
            .as_deref()
            .unwrap_or_default()
            .parse()?;
        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EnterpriseError::validation("title", "A case title is required"))?
            .to_string();
        let sla_days = request.sla_days.unwrap_or(self.sla_days);
        let sla_deadline = sla_deadline(sla_days)?;

        let mut attempt = 0;
        let record = loop {
            attempt += 1;
            let params = NewCaseParams {
                identifier: case_id::generate(practice_area),
                title: title.clone(),
                description: request.description.clone(),
                practice_area,
                status: CaseStatus::Open,
                client_id: request.client_id,
                assigned_lawyer_id: Some(actor.user_id),
                sla_deadline: Some(sla_deadline),
                created_by: actor.user_id,
            };
            match self.db.insert_case(&params).await {
                Ok(record) => break record,
                Err(DatabaseError::Constraint(message)) if attempt < MAX_MINT_ATTEMPTS => {
                    tracing::debug!(attempt, "Case identifier collision, minting again: {}", message);
                }
                Err(e) => return Err(e.into()),
            }
        };

        let display_id = record.display_id.clone().unwrap_or_default();
        tracing::info!(
            case_id = %display_id,
            practice_area = %practice_area,
            actor_id = actor.user_id,
            "Case created"
        );
        if let Some(key) = record.correlation_key {
            self.ledger.record(
                NewAuditEntry::new(actor, AuditAction::CaseCreated, "cases")
                    .with_case(key)
                    .with_metadata(json!({
                        "case_id": display_id,
                        "practice_area": practice_area.as_str(),
                        "title": title,
                    })),
            );
        }
        Ok(CaseView::from_record(record))
    }

    pub async fn get_case(&self, actor: &Actor, display_id: &str) -> Result<CaseView, EnterpriseError> {
        require_permission(actor, Permission::ViewCase)?;
        self.resolve_case(actor, display_id).await.map(CaseView::from_record)
    }

    pub async fn list_cases(&self, actor: &Actor) -> Result<Vec<CaseView>, EnterpriseError> {
        require_permission(actor, Permission::ViewCase)?;
        Ok(rbac::accessible_cases(self.db.as_ref(), actor.user_id, actor.role)
            .await
            .into_iter()
            .filter(|case| !case.is_legacy())
            .map(CaseView::from_record)
            .collect())
    }

    pub async fn update_status(
        &self,
        actor: &Actor,
        display_id: &str,
        status: CaseStatus,
        reason: Option<&str>,
    ) -> Result<CaseView, EnterpriseError> {
        require_permission(actor, Permission::EditCase)?;
        if status == CaseStatus::Closed {
            require_permission(actor, Permission::CloseCase)?;
        }
        let case = self.resolve_case(actor, display_id).await?;
        let key = case
            .correlation_key
            .ok_or_else(|| EnterpriseError::CaseNotFound(display_id.to_string()))?;

        let now = Utc::now();
        if !self.db.update_case_status(key, status, actor.user_id, now).await? {
            return Err(EnterpriseError::CaseNotFound(display_id.to_string()));
        }

        let action = if status == CaseStatus::Closed {
            AuditAction::CaseClosed
        } else {
            AuditAction::CaseUpdated
        };
        self.ledger.record(
            NewAuditEntry::new(actor, action, "cases")
                .with_case(key)
                .with_metadata(json!({
                    "case_id": case.display_id,
                    "old_status": case.status,
                    "new_status": status.as_str(),
                    "reason": reason,
                })),
        );

        let updated = self
            .db
            .get_case_by_key(key)
            .await?
            .ok_or_else(|| EnterpriseError::CaseNotFound(display_id.to_string()))?;
        Ok(CaseView::from_record(updated))
    }

    /// Resolve an optional case reference and apply phase gating to it.
    async fn gate(
        &self,
        actor: &Actor,
        action: GatedAction,
        display_id: Option<&str>,
    ) -> Result<(Option<CaseRecord>, Option<String>), EnterpriseError> {
        let case = match display_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Some(self.resolve_case(actor, id).await?),
            None => None,
        };
        let warning = self
            .phases
            .check_compliance(action, case.is_some())
            .await?
            .into_result()?;
        Ok((case, warning))
    }

    pub async fn send_message(
        &self,
        actor: &Actor,
        draft: MessageDraft,
    ) -> Result<ActivityOutcome, EnterpriseError> {
        require_permission(actor, Permission::SendMessages)?;
        if draft.content.trim().is_empty() {
            return Err(EnterpriseError::validation("content", "Message content is required"));
        }
        let (case, warning) = self
            .gate(actor, GatedAction::SendMessage, draft.case_id.as_deref())
            .await?;
        let case_key = case.as_ref().and_then(|c| c.correlation_key);
        let display_id = case.as_ref().and_then(|c| c.display_id.clone());

        let now = Utc::now();
        let id = self
            .db
            .insert_message(&NewMessageParams {
                case_key,
                display_id: display_id.clone(),
                sender_id: actor.user_id,
                sender_role: actor.role,
                content: draft.content,
                is_internal_note: draft.is_internal_note,
                created_at: now,
            })
            .await?;
        if let Some(key) = case_key {
            self.db.touch_case_activity(key, now).await?;
        }

        let mut entry = NewAuditEntry::new(actor, AuditAction::ChatMessageSent, "chat_messages")
            .with_metadata(json!({
                "message_id": id,
                "case_id": display_id,
                "is_internal_note": draft.is_internal_note,
            }));
        if let Some(key) = case_key {
            entry = entry.with_case(key);
        }
        self.ledger.record(entry);

        Ok(ActivityOutcome {
            id,
            case_id: display_id,
            warning,
        })
    }

    pub async fn upload_document(
        &self,
        actor: &Actor,
        draft: DocumentDraft,
    ) -> Result<ActivityOutcome, EnterpriseError> {
        require_permission(actor, Permission::UploadDocuments)?;
        let file_name = draft.file_name.trim();
        if file_name.is_empty() {
            return Err(EnterpriseError::validation("file_name", "A file name is required"));
        }
        let (case, warning) = self
            .gate(actor, GatedAction::UploadDocument, draft.case_id.as_deref())
            .await?;
        let case_key = case.as_ref().and_then(|c| c.correlation_key);
        let display_id = case.as_ref().and_then(|c| c.display_id.clone());

        let now = Utc::now();
        let id = self
            .db
            .insert_document(&NewDocumentParams {
                case_key,
                display_id: display_id.clone(),
                uploaded_by: actor.user_id,
                file_name: file_name.to_string(),
                document_hash: draft.document_hash.clone(),
                created_at: now,
            })
            .await?;
        if let Some(key) = case_key {
            self.db.touch_case_activity(key, now).await?;
        }

        let mut entry = NewAuditEntry::new(actor, AuditAction::DocumentUploaded, "documents")
            .with_metadata(json!({
                "document_id": id,
                "case_id": display_id,
                "file_name": file_name,
            }));
        if let Some(key) = case_key {
            entry = entry.with_case(key);
        }
        self.ledger.record(entry);

        Ok(ActivityOutcome {
            id,
            case_id: display_id,
            warning,
        })
    }

    pub async fn download_document(
        &self,
        actor: &Actor,
        document_id: i64,
    ) -> Result<DocumentView, EnterpriseError> {
        require_permission(actor, Permission::DownloadDocuments)?;
        let document = self
            .db
            .get_document(document_id)
            .await?
            .ok_or(EnterpriseError::DocumentNotFound(document_id))?;

        let allowed = match document.case_key {
            Some(key) => {
                rbac::has_case_access(self.db.as_ref(), actor.user_id, actor.role, key).await
            }
            None => {
                document.uploaded_by == actor.user_id
                    || matches!(actor.role, Role::Admin | Role::CaseManager)
            }
        };
        if !allowed {
            return Err(EnterpriseError::AccessDenied(format!(
                "user {} may not download document {}",
                actor.user_id, document_id
            )));
        }

        let mut entry = NewAuditEntry::new(actor, AuditAction::DocumentDownloaded, "documents")
            .with_metadata(json!({
                "document_id": document.id,
                "case_id": document.display_id,
                "file_name": document.file_name,
            }));
        if let Some(key) = document.case_key {
            entry = entry.with_case(key);
        }
        self.ledger.record(entry);

        Ok(document.into())
    }

    /// Remove a case together with its messages and documents.
    pub async fn delete_case(&self, actor: &Actor, display_id: &str) -> Result<(), EnterpriseError> {
        require_permission(actor, Permission::EditCase)?;
        let case = self.resolve_case(actor, display_id).await?;
        let key = case
            .correlation_key
            .ok_or_else(|| EnterpriseError::CaseNotFound(display_id.to_string()))?;

        let messages = self.db.count_case_activity(ActivityKind::Message, key).await?;
        let documents = self.db.count_case_activity(ActivityKind::Document, key).await?;
        if !self.db.delete_case(key).await? {
            return Err(EnterpriseError::CaseNotFound(display_id.to_string()));
        }
        tracing::info!(case_id = %display_id, messages, documents, "Case deleted");

        self.ledger.record(
            NewAuditEntry::new(actor, AuditAction::CaseUpdated, "cases")
                .with_case(key)
                .with_metadata(json!({
                    "case_id": case.display_id,
                    "operation": "delete",
                    "messages_removed": messages,
                    "documents_removed": documents,
                })),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use super::*;
    use crate::db::libsql::test_support::{TestBackend, setup_backend};
    use crate::db::memory::{MemoryAuditStore, MemoryConfigStore};
    use crate::enterprise::phase::RolloutPhase;

    struct Harness {
        desk: CaseDesk,
        phases: Arc<PhaseController>,
        audit: Arc<MemoryAuditStore>,
        _db: TestBackend,
    }

    async fn harness() -> Harness {
        let db = setup_backend().await;
        let audit = Arc::new(MemoryAuditStore::default());
        let ledger = AuditLedger::new(audit.clone());
        let phases = Arc::new(PhaseController::new(
            Arc::new(MemoryConfigStore::default()),
            Arc::new(db.backend.clone()),
            ledger.clone(),
        ));
        let desk = CaseDesk::new(Arc::new(db.backend.clone()), phases.clone(), ledger);
        Harness {
            desk,
            phases,
            audit,
            _db: db,
        }
    }

    async fn wait_for_audit(store: &MemoryAuditStore, count: usize) {
        for _ in 0..100 {
            if store.entries().len() >= count {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        panic!("expected {count} audit entries, found {}", store.entries().len());
    }

    fn lawyer() -> Actor {
        Actor::new(10, Role::Lawyer)
    }

    fn client() -> Actor {
        Actor::new(20, Role::User)
    }

    async fn open_case(h: &Harness) -> CaseView {
        h.desk
            .create_case(
                &lawyer(),
                NewCaseRequest {
                    title: Some("Custody dispute".to_string()),
                    practice_area: Some("FAMILY".to_string()),
                    client_id: Some(20),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_case_mints_identifier_and_audits() {
        let h = harness().await;
        let view = open_case(&h).await;

        assert!(case_id::validate(&view.case_id));
        assert!(view.case_id.starts_with("LC-FAMILY-"));
        assert_eq!(view.status, "OPEN");
        assert_eq!(view.assigned_lawyer_id, Some(10));
        let deadline = view.sla_deadline.unwrap();
        assert!(deadline > Utc::now() + Duration::days(29));

        wait_for_audit(&h.audit, 1).await;
        let entry = &h.audit.entries()[0];
        assert_eq!(entry.action, AuditAction::CaseCreated);
        assert_eq!(entry.metadata["case_id"], view.case_id.as_str());
        assert!(entry.case_key.is_some());
    }

    #[tokio::test]
    async fn create_case_bounds_the_sla_window() {
        let h = harness().await;
        let err = h
            .desk
            .create_case(
                &lawyer(),
                NewCaseRequest {
                    title: Some("Long haul".to_string()),
                    practice_area: Some("TAX".to_string()),
                    sla_days: Some(u32::MAX),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        let view = h
            .desk
            .create_case(
                &lawyer(),
                NewCaseRequest {
                    title: Some("Long haul".to_string()),
                    practice_area: Some("TAX".to_string()),
                    sla_days: Some(MAX_SLA_DAYS),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(view.sla_deadline.unwrap() > Utc::now() + Duration::days(3649));
    }

    #[tokio::test]
    async fn create_case_rejects_bad_input() {
        let h = harness().await;
        let err = h
            .desk
            .create_case(
                &lawyer(),
                NewCaseRequest {
                    title: Some("x".to_string()),
                    practice_area: Some("MARITIME".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_practice_area");

        let err = h
            .desk
            .create_case(
                &lawyer(),
                NewCaseRequest {
                    title: Some("  ".to_string()),
                    practice_area: Some("TAX".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        let err = h
            .desk
            .create_case(&client(), NewCaseRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "access_denied");
        assert!(h.audit.entries().is_empty());
    }

    #[tokio::test]
    async fn get_case_checks_format_existence_and_access() {
        let h = harness().await;
        let view = open_case(&h).await;

        assert_eq!(h.desk.get_case(&client(), &view.case_id).await.unwrap(), view);

        let err = h.desk.get_case(&lawyer(), "LC-FAMILY-25-ABCDEF123456").await.unwrap_err();
        assert_eq!(err.kind(), "invalid_identifier_format");

        let err = h
            .desk
            .get_case(&lawyer(), "LC-FAMILY-2025-000000000000")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let err = h
            .desk
            .get_case(&Actor::new(99, Role::Lawyer), &view.case_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "access_denied");

        assert!(h.desk.get_case(&Actor::new(1, Role::Admin), &view.case_id).await.is_ok());
    }

    #[tokio::test]
    async fn closing_requires_close_permission() {
        let h = harness().await;
        let view = open_case(&h).await;

        let err = h
            .desk
            .update_status(&lawyer(), &view.case_id, CaseStatus::Closed, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "access_denied");

        let updated = h
            .desk
            .update_status(&lawyer(), &view.case_id, CaseStatus::InProgress, Some("filed"))
            .await
            .unwrap();
        assert_eq!(updated.status, "IN_PROGRESS");
        assert!(updated.last_activity_at.is_some());

        let manager = Actor::new(5, Role::CaseManager);
        let closed = h
            .desk
            .update_status(&manager, &view.case_id, CaseStatus::Closed, Some("settled"))
            .await
            .unwrap();
        assert_eq!(closed.status, "CLOSED");

        wait_for_audit(&h.audit, 3).await;
        let actions: Vec<_> = h.audit.entries().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::CaseCreated, AuditAction::CaseUpdated, AuditAction::CaseClosed]
        );
    }

    #[tokio::test]
    async fn soft_phase_warns_on_unassociated_messages() {
        let h = harness().await;
        let outcome = h
            .desk
            .send_message(
                &client(),
                MessageDraft {
                    case_id: None,
                    content: "General question".to_string(),
                    is_internal_note: false,
                },
            )
            .await
            .unwrap();
        assert!(outcome.warning.is_some());
        assert!(outcome.case_id.is_none());
    }

    #[tokio::test]
    async fn gated_phase_rejects_unassociated_content() {
        let h = harness().await;
        let view = open_case(&h).await;
        h.phases
            .transition(RolloutPhase::GatedCreation, &Actor::new(1, Role::Admin), "rollout")
            .await
            .unwrap();

        let err = h
            .desk
            .upload_document(
                &client(),
                DocumentDraft {
                    case_id: None,
                    file_name: "scan.pdf".to_string(),
                    document_hash: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "phase_rejected");

        let outcome = h
            .desk
            .upload_document(
                &client(),
                DocumentDraft {
                    case_id: Some(view.case_id.clone()),
                    file_name: "scan.pdf".to_string(),
                    document_hash: Some("abc".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(outcome.warning.is_none());
        assert_eq!(outcome.case_id.as_deref(), Some(view.case_id.as_str()));

        let refreshed = h.desk.get_case(&client(), &view.case_id).await.unwrap();
        assert!(refreshed.last_activity_at.is_some());
    }

    #[tokio::test]
    async fn messages_to_foreign_cases_are_denied() {
        let h = harness().await;
        let view = open_case(&h).await;
        let err = h
            .desk
            .send_message(
                &Actor::new(77, Role::User),
                MessageDraft {
                    case_id: Some(view.case_id),
                    content: "hi".to_string(),
                    is_internal_note: false,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "access_denied");
    }

    #[tokio::test]
    async fn download_checks_case_access() {
        let h = harness().await;
        let view = open_case(&h).await;
        let outcome = h
            .desk
            .upload_document(
                &lawyer(),
                DocumentDraft {
                    case_id: Some(view.case_id.clone()),
                    file_name: "brief.pdf".to_string(),
                    document_hash: None,
                },
            )
            .await
            .unwrap();

        let doc = h.desk.download_document(&client(), outcome.id).await.unwrap();
        assert_eq!(doc.file_name, "brief.pdf");
        assert_eq!(doc.case_id.as_deref(), Some(view.case_id.as_str()));

        let err = h
            .desk
            .download_document(&Actor::new(55, Role::User), outcome.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "access_denied");

        let err = h.desk.download_document(&client(), 4_242).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn delete_case_cascades_activity() {
        let h = harness().await;
        let view = open_case(&h).await;
        let outcome = h
            .desk
            .send_message(
                &client(),
                MessageDraft {
                    case_id: Some(view.case_id.clone()),
                    content: "update?".to_string(),
                    is_internal_note: false,
                },
            )
            .await
            .unwrap();
        assert!(outcome.id > 0);

        h.desk.delete_case(&lawyer(), &view.case_id).await.unwrap();
        let err = h.desk.get_case(&lawyer(), &view.case_id).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert!(h.desk.list_cases(&lawyer()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_cases_is_scoped_by_role() {
        let h = harness().await;
        let view = open_case(&h).await;
        assert_eq!(h.desk.list_cases(&client()).await.unwrap(), vec![view.clone()]);
        assert!(h.desk.list_cases(&Actor::new(3, Role::User)).await.unwrap().is_empty());
        assert_eq!(
            h.desk.list_cases(&Actor::new(1, Role::Admin)).await.unwrap(),
            vec![view]
        );
    }
}
