//! Rollout phase state machine.
//!
//! ```text
//! SOFT_WARNINGS ──► GATED_CREATION ──► CASE_ONLY_MODE
//!       ▲                 │  ▲                │
//!       └─────────────────┘  └────────────────┘
//! ```
//!
//! The active phase is one versioned row in the system configuration
//! store. Transitions are compare-and-set against the value being
//! replaced, so legality is always judged against the persisted phase.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::{ActivityKind, ActivityStore, AssociationCounts, DailyAssociation, SystemConfigStore};
use crate::enterprise::audit::{AuditLedger, AuditReceipt, NewAuditEntry};
use crate::enterprise::rbac::{Actor, require_permission};
use crate::enterprise::types::{AuditAction, Permission};
use crate::error::{DatabaseError, EnterpriseError};

pub const DEFAULT_PHASE_KEY: &str = "communication_enforcement_phase";
pub const DEFAULT_SCHEDULE_KEY: &str = "phase_transition_schedule";
pub const DEFAULT_ADOPTION_WINDOW_DAYS: u32 = 7;
/// Ten years.
pub const MAX_ADOPTION_WINDOW_DAYS: u32 = 3650;

const MAX_TRANSITION_ATTEMPTS: usize = 3;
const WEEKLY_ACTIVITY_DAYS: i64 = 7;

const SOFT_WARNING: &str =
    "Consider associating this action with a case for better organization and compliance.";
const GATED_ERROR: &str =
    "Case association is required. Please select or create a case before proceeding.";
const CASE_ONLY_ERROR: &str =
    "All communication must be associated with a case. General messaging is no longer available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolloutPhase {
    SoftWarnings,
    GatedCreation,
    CaseOnlyMode,
}

impl RolloutPhase {
    pub const ALL: [RolloutPhase; 3] = [
        Self::SoftWarnings,
        Self::GatedCreation,
        Self::CaseOnlyMode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SoftWarnings => "SOFT_WARNINGS",
            Self::GatedCreation => "GATED_CREATION",
            Self::CaseOnlyMode => "CASE_ONLY_MODE",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "SOFT_WARNINGS" => Some(Self::SoftWarnings),
            "GATED_CREATION" => Some(Self::GatedCreation),
            "CASE_ONLY_MODE" => Some(Self::CaseOnlyMode),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::SoftWarnings => {
                "Soft Warnings - Users see prompts to associate communication with cases"
            }
            Self::GatedCreation => {
                "Gated Creation - New messages and documents require case association"
            }
            Self::CaseOnlyMode => "Case-Only Mode - All communication must be case-centric",
        }
    }

    /// Phases reachable in one step, forward first.
    pub fn successors(self) -> &'static [RolloutPhase] {
        match self {
            Self::SoftWarnings => &[Self::GatedCreation],
            Self::GatedCreation => &[Self::CaseOnlyMode, Self::SoftWarnings],
            Self::CaseOnlyMode => &[Self::GatedCreation],
        }
    }

    pub fn can_transition_to(self, target: RolloutPhase) -> bool {
        self.successors().contains(&target)
    }

    pub fn compliance(self, _action: GatedAction, has_case_association: bool) -> ComplianceDecision {
        if has_case_association {
            return ComplianceDecision::allow();
        }
        match self {
            Self::SoftWarnings => ComplianceDecision::warn(SOFT_WARNING),
            Self::GatedCreation => ComplianceDecision::deny(GATED_ERROR),
            Self::CaseOnlyMode => ComplianceDecision::deny(CASE_ONLY_ERROR),
        }
    }
}

impl fmt::Display for RolloutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RolloutPhase {
    type Err = EnterpriseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_value(s.trim())
            .ok_or_else(|| EnterpriseError::validation("target_phase", "Invalid target phase"))
    }
}

/// Content-creating action subject to phase gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatedAction {
    SendMessage,
    UploadDocument,
}

impl GatedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendMessage => "SEND_MESSAGE",
            Self::UploadDocument => "UPLOAD_DOCUMENT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComplianceDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            warning: None,
            error: None,
        }
    }

    fn warn(message: &str) -> Self {
        Self {
            allowed: true,
            warning: Some(message.to_string()),
            error: None,
        }
    }

    fn deny(message: &str) -> Self {
        Self {
            allowed: false,
            warning: None,
            error: Some(message.to_string()),
        }
    }

    /// Turn a rejection into `PhaseRejected`; pass any warning through.
    pub fn into_result(self) -> Result<Option<String>, EnterpriseError> {
        if self.allowed {
            Ok(self.warning)
        } else {
            Err(EnterpriseError::PhaseRejected(
                self.error
                    .unwrap_or_else(|| "Case association is required.".to_string()),
            ))
        }
    }
}

/// Raw transition request as received from an admin surface.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitionRequest {
    pub target_phase: Option<String>,
    pub reason: Option<String>,
}

impl TransitionRequest {
    /// Both fields are mandatory; a blank reason counts as missing.
    pub fn parse(&self) -> Result<(RolloutPhase, String), EnterpriseError> {
        let target = self
            .target_phase
            .as_deref()
            .ok_or_else(|| EnterpriseError::validation("target_phase", "Invalid target phase"))?
            .parse::<RolloutPhase>()?;
        let reason = self
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| EnterpriseError::validation("reason", "A transition reason is required"))?;
        Ok((target, reason.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTransition {
    pub previous_phase: RolloutPhase,
    pub current_phase: RolloutPhase,
    pub transition_time: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdoptionMetrics {
    pub period_days: u32,
    pub message_association_rate: u32,
    pub document_association_rate: u32,
    pub total_messages: u64,
    pub associated_messages: u64,
    pub daily_trend: Vec<DailyAssociation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseMetrics {
    pub message_association_rate: u32,
    pub document_association_rate: u32,
    pub weekly_activity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseStatus {
    pub current_phase: RolloutPhase,
    pub phase_description: &'static str,
    pub metrics: PhaseMetrics,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleNotifications {
    pub phase_1_warning: u32,
    pub phase_2_warning: u32,
}

/// Advisory rollout schedule. Nothing transitions on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSchedule {
    pub phase_1_duration: u32,
    pub phase_2_duration: u32,
    pub auto_transition: bool,
    pub notifications: ScheduleNotifications,
}

impl Default for PhaseSchedule {
    fn default() -> Self {
        Self {
            phase_1_duration: 14,
            phase_2_duration: 30,
            auto_transition: false,
            notifications: ScheduleNotifications {
                phase_1_warning: 7,
                phase_2_warning: 14,
            },
        }
    }
}

/// Share of associated items as a whole percentage, rounded half up.
/// An empty window rates 0.
pub fn association_rate(counts: AssociationCounts) -> u32 {
    if counts.total == 0 {
        return 0;
    }
    let rounded = (counts.associated * 200 + counts.total) / (counts.total * 2);
    u32::try_from(rounded).unwrap_or(100)
}

pub fn recommendations(phase: RolloutPhase, metrics: &PhaseMetrics) -> Vec<String> {
    let mut out = Vec::new();
    if phase != RolloutPhase::SoftWarnings {
        return out;
    }
    if metrics.message_association_rate < 30 {
        out.push("Consider user training on case association benefits".to_string());
    }
    if metrics.message_association_rate > 70 {
        out.push("High adoption rate - consider transitioning to Phase 2".to_string());
    }
    if metrics.weekly_activity < 10 {
        out.push("Low activity - monitor user engagement".to_string());
    }
    out
}

pub struct PhaseController {
    config: Arc<dyn SystemConfigStore>,
    activity: Arc<dyn ActivityStore>,
    ledger: AuditLedger,
    phase_key: String,
    schedule_key: String,
}

impl PhaseController {
    pub fn new(
        config: Arc<dyn SystemConfigStore>,
        activity: Arc<dyn ActivityStore>,
        ledger: AuditLedger,
    ) -> Self {
        Self {
            config,
            activity,
            ledger,
            phase_key: DEFAULT_PHASE_KEY.to_string(),
            schedule_key: DEFAULT_SCHEDULE_KEY.to_string(),
        }
    }

    pub fn with_keys(mut self, phase_key: impl Into<String>, schedule_key: impl Into<String>) -> Self {
        self.phase_key = phase_key.into();
        self.schedule_key = schedule_key.into();
        self
    }

    pub fn phase_key(&self) -> &str {
        &self.phase_key
    }

    /// Stored raw value alongside the phase it resolves to.
    async fn read_phase(&self) -> Result<(Option<String>, RolloutPhase), DatabaseError> {
        let Some(entry) = self.config.get_config(&self.phase_key).await? else {
            return Ok((None, RolloutPhase::SoftWarnings));
        };
        let phase = match RolloutPhase::from_db_value(&entry.value) {
            Some(phase) => phase,
            None => {
                tracing::warn!(
                    key = %self.phase_key,
                    value = %entry.value,
                    "Unreadable rollout phase, treating as SOFT_WARNINGS"
                );
                RolloutPhase::SoftWarnings
            }
        };
        Ok((Some(entry.value), phase))
    }

    pub async fn current_phase(&self) -> Result<RolloutPhase, DatabaseError> {
        self.read_phase().await.map(|(_, phase)| phase)
    }

    /// Persist SOFT_WARNINGS if no phase has been stored yet.
    pub async fn ensure_initialized(&self) -> Result<RolloutPhase, DatabaseError> {
        let created = self
            .config
            .compare_and_set_config(&self.phase_key, None, RolloutPhase::SoftWarnings.as_str())
            .await?;
        if created {
            tracing::info!(key = %self.phase_key, "Initialized rollout phase to SOFT_WARNINGS");
        }
        self.current_phase().await
    }

    pub async fn check_compliance(
        &self,
        action: GatedAction,
        has_case_association: bool,
    ) -> Result<ComplianceDecision, DatabaseError> {
        let phase = self.current_phase().await?;
        Ok(phase.compliance(action, has_case_association))
    }

    pub async fn transition(
        &self,
        target: RolloutPhase,
        actor: &Actor,
        reason: &str,
    ) -> Result<PhaseTransition, EnterpriseError> {
        self.transition_audited(target, actor, reason)
            .await
            .map(|(transition, _receipt)| transition)
    }

    /// [`Self::transition`], also handing back the ledger write receipt.
    pub async fn transition_audited(
        &self,
        target: RolloutPhase,
        actor: &Actor,
        reason: &str,
    ) -> Result<(PhaseTransition, AuditReceipt), EnterpriseError> {
        require_permission(actor, Permission::ManagePhases)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EnterpriseError::validation(
                "reason",
                "A transition reason is required",
            ));
        }

        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let (raw, current) = self.read_phase().await?;
            if !current.can_transition_to(target) {
                return Err(EnterpriseError::IllegalTransition {
                    from: current,
                    to: target,
                });
            }

            let landed = self
                .config
                .compare_and_set_config(&self.phase_key, raw.as_deref(), target.as_str())
                .await?;
            if !landed {
                tracing::debug!(attempt, "Rollout phase changed underneath transition, retrying");
                continue;
            }

            let transition = PhaseTransition {
                previous_phase: current,
                current_phase: target,
                transition_time: Utc::now(),
                reason: reason.to_string(),
            };
            tracing::info!(
                from = %current,
                to = %target,
                actor_id = actor.user_id,
                "Rollout phase transitioned"
            );
            let receipt = self.ledger.record(
                NewAuditEntry::new(actor, AuditAction::PhaseTransition, "system_config")
                    .with_metadata(json!({
                        "from_phase": current.as_str(),
                        "to_phase": target.as_str(),
                        "reason": reason,
                    })),
            );
            return Ok((transition, receipt));
        }

        Err(EnterpriseError::Conflict(format!(
            "rollout phase changed concurrently {MAX_TRANSITION_ATTEMPTS} times; retry the transition"
        )))
    }

    /// Association rates over the trailing `window_days`, with a per-day
    /// message trend (newest day first).
    pub async fn adoption_metrics(
        &self,
        window_days: u32,
    ) -> Result<AdoptionMetrics, EnterpriseError> {
        if window_days > MAX_ADOPTION_WINDOW_DAYS {
            return Err(EnterpriseError::validation(
                "days",
                format!("window may not exceed {MAX_ADOPTION_WINDOW_DAYS} days"),
            ));
        }
        let since = Utc::now()
            .checked_sub_signed(Duration::days(i64::from(window_days)))
            .ok_or_else(|| EnterpriseError::validation("days", "window start is out of range"))?;
        let messages = self
            .activity
            .association_counts(ActivityKind::Message, Some(since))
            .await?;
        let documents = self
            .activity
            .association_counts(ActivityKind::Document, Some(since))
            .await?;
        let daily_trend = self
            .activity
            .daily_association_counts(ActivityKind::Message, since)
            .await?;

        Ok(AdoptionMetrics {
            period_days: window_days,
            message_association_rate: association_rate(messages),
            document_association_rate: association_rate(documents),
            total_messages: messages.total,
            associated_messages: messages.associated,
            daily_trend,
        })
    }

    pub async fn status(&self) -> Result<PhaseStatus, DatabaseError> {
        let phase = self.current_phase().await?;
        let messages = self
            .activity
            .association_counts(ActivityKind::Message, None)
            .await?;
        let documents = self
            .activity
            .association_counts(ActivityKind::Document, None)
            .await?;
        let weekly_activity = self
            .ledger
            .activity_since(Utc::now() - Duration::days(WEEKLY_ACTIVITY_DAYS))
            .await?;

        let metrics = PhaseMetrics {
            message_association_rate: association_rate(messages),
            document_association_rate: association_rate(documents),
            weekly_activity,
        };
        Ok(PhaseStatus {
            current_phase: phase,
            phase_description: phase.description(),
            recommendations: recommendations(phase, &metrics),
            metrics,
        })
    }

    pub async fn schedule(&self) -> Result<PhaseSchedule, DatabaseError> {
        let Some(entry) = self.config.get_config(&self.schedule_key).await? else {
            return Ok(PhaseSchedule::default());
        };
        match serde_json::from_str(&entry.value) {
            Ok(schedule) => Ok(schedule),
            Err(e) => {
                tracing::warn!(key = %self.schedule_key, "Unreadable phase schedule, using defaults: {}", e);
                Ok(PhaseSchedule::default())
            }
        }
    }

    pub async fn set_schedule(
        &self,
        actor: &Actor,
        schedule: &PhaseSchedule,
    ) -> Result<(), EnterpriseError> {
        require_permission(actor, Permission::ManagePhases)?;
        let value = serde_json::to_string(schedule)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.config.put_config(&self.schedule_key, &value).await?;
        tracing::info!(
            phase_1_duration = schedule.phase_1_duration,
            phase_2_duration = schedule.phase_2_duration,
            auto_transition = schedule.auto_transition,
            "Phase transition schedule updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::libsql::test_support::setup_backend;
    use crate::db::memory::{MemoryAuditStore, MemoryConfigStore};
    use crate::db::{ActivityStore, NewMessageParams};
    use crate::enterprise::types::Role;

    fn admin() -> Actor {
        Actor::new(1, Role::Admin)
    }

    struct Harness {
        controller: PhaseController,
        config: Arc<MemoryConfigStore>,
        audit: Arc<MemoryAuditStore>,
        _db: crate::db::libsql::test_support::TestBackend,
    }

    async fn harness() -> Harness {
        let db = setup_backend().await;
        let config = Arc::new(MemoryConfigStore::default());
        let audit = Arc::new(MemoryAuditStore::default());
        let controller = PhaseController::new(
            config.clone(),
            Arc::new(db.backend.clone()),
            AuditLedger::new(audit.clone()),
        );
        Harness {
            controller,
            config,
            audit,
            _db: db,
        }
    }

    #[test]
    fn transition_table() {
        use RolloutPhase::*;
        let legal = [
            (SoftWarnings, GatedCreation),
            (GatedCreation, CaseOnlyMode),
            (GatedCreation, SoftWarnings),
            (CaseOnlyMode, GatedCreation),
        ];
        for from in RolloutPhase::ALL {
            for to in RolloutPhase::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn compliance_table() {
        for action in [GatedAction::SendMessage, GatedAction::UploadDocument] {
            let soft = RolloutPhase::SoftWarnings.compliance(action, false);
            assert!(soft.allowed);
            assert!(soft.warning.is_some());
            assert!(soft.error.is_none());

            for phase in [RolloutPhase::GatedCreation, RolloutPhase::CaseOnlyMode] {
                let denied = phase.compliance(action, false);
                assert!(!denied.allowed);
                assert!(denied.error.is_some());
            }

            for phase in RolloutPhase::ALL {
                assert_eq!(phase.compliance(action, true), ComplianceDecision::allow());
            }
        }
    }

    #[test]
    fn rejected_decision_maps_to_phase_rejected() {
        let err = RolloutPhase::CaseOnlyMode
            .compliance(GatedAction::SendMessage, false)
            .into_result()
            .unwrap_err();
        assert_eq!(err.kind(), "phase_rejected");
        assert_eq!(err.to_string(), CASE_ONLY_ERROR);
    }

    #[test]
    fn rates_round_and_handle_empty_windows() {
        assert_eq!(association_rate(AssociationCounts { total: 0, associated: 0 }), 0);
        assert_eq!(association_rate(AssociationCounts { total: 3, associated: 1 }), 33);
        assert_eq!(association_rate(AssociationCounts { total: 3, associated: 2 }), 67);
        assert_eq!(association_rate(AssociationCounts { total: 8, associated: 1 }), 13);
        assert_eq!(association_rate(AssociationCounts { total: 4, associated: 4 }), 100);
    }

    #[test]
    fn recommendations_only_apply_in_soft_warnings() {
        let low = PhaseMetrics {
            message_association_rate: 10,
            document_association_rate: 0,
            weekly_activity: 2,
        };
        assert_eq!(recommendations(RolloutPhase::SoftWarnings, &low).len(), 2);
        assert!(recommendations(RolloutPhase::GatedCreation, &low).is_empty());

        let high = PhaseMetrics {
            message_association_rate: 85,
            document_association_rate: 0,
            weekly_activity: 50,
        };
        assert_eq!(
            recommendations(RolloutPhase::SoftWarnings, &high),
            vec!["High adoption rate - consider transitioning to Phase 2".to_string()]
        );
    }

    #[test]
    fn transition_request_requires_phase_and_reason() {
        let ok = TransitionRequest {
            target_phase: Some("GATED_CREATION".to_string()),
            reason: Some("  adoption above 70%  ".to_string()),
        };
        assert_eq!(
            ok.parse().unwrap(),
            (RolloutPhase::GatedCreation, "adoption above 70%".to_string())
        );

        let blank = TransitionRequest {
            target_phase: Some("GATED_CREATION".to_string()),
            reason: Some("   ".to_string()),
        };
        assert_eq!(blank.parse().unwrap_err().kind(), "validation");

        let unknown = TransitionRequest {
            target_phase: Some("PHASE_4".to_string()),
            reason: Some("why not".to_string()),
        };
        assert_eq!(unknown.parse().unwrap_err().kind(), "validation");
    }

    #[tokio::test]
    async fn absent_or_unreadable_phase_reads_as_soft_warnings() {
        let h = harness().await;
        assert_eq!(h.controller.current_phase().await.unwrap(), RolloutPhase::SoftWarnings);

        h.config.put_config(DEFAULT_PHASE_KEY, "PHASE_9").await.unwrap();
        assert_eq!(h.controller.current_phase().await.unwrap(), RolloutPhase::SoftWarnings);
    }

    #[tokio::test]
    async fn ensure_initialized_does_not_overwrite() {
        let h = harness().await;
        assert_eq!(h.controller.ensure_initialized().await.unwrap(), RolloutPhase::SoftWarnings);
        h.config
            .put_config(DEFAULT_PHASE_KEY, RolloutPhase::GatedCreation.as_str())
            .await
            .unwrap();
        assert_eq!(h.controller.ensure_initialized().await.unwrap(), RolloutPhase::GatedCreation);
    }

    #[tokio::test]
    async fn legal_transition_persists_and_audits() {
        let h = harness().await;
        let (transition, receipt) = h
            .controller
            .transition_audited(RolloutPhase::GatedCreation, &admin(), "pilot complete")
            .await
            .unwrap();
        receipt.settle().await;

        assert_eq!(transition.previous_phase, RolloutPhase::SoftWarnings);
        assert_eq!(transition.current_phase, RolloutPhase::GatedCreation);
        assert_eq!(transition.reason, "pilot complete");
        assert_eq!(h.controller.current_phase().await.unwrap(), RolloutPhase::GatedCreation);

        let entries = h.audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::PhaseTransition);
        assert_eq!(entries[0].entity, "system_config");
        assert_eq!(
            entries[0].metadata,
            json!({
                "from_phase": "SOFT_WARNINGS",
                "to_phase": "GATED_CREATION",
                "reason": "pilot complete",
            })
        );
        assert!(entries[0].verify());
    }

    #[tokio::test]
    async fn skipping_a_phase_is_illegal_and_leaves_state_untouched() {
        let h = harness().await;
        let err = h
            .controller
            .transition(RolloutPhase::CaseOnlyMode, &admin(), "rush")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EnterpriseError::IllegalTransition {
                from: RolloutPhase::SoftWarnings,
                to: RolloutPhase::CaseOnlyMode
            }
        ));
        assert_eq!(h.controller.current_phase().await.unwrap(), RolloutPhase::SoftWarnings);
        assert!(h.config.get_config(DEFAULT_PHASE_KEY).await.unwrap().is_none());
        assert!(h.audit.entries().is_empty());
    }

    #[tokio::test]
    async fn every_pair_matches_the_transition_table() {
        for from in RolloutPhase::ALL {
            for to in RolloutPhase::ALL {
                let h = harness().await;
                h.config.put_config(DEFAULT_PHASE_KEY, from.as_str()).await.unwrap();
                let result = h.controller.transition(to, &admin(), "table check").await;
                if from.can_transition_to(to) {
                    assert!(result.is_ok(), "{from} -> {to}");
                    assert_eq!(h.controller.current_phase().await.unwrap(), to);
                } else {
                    assert_eq!(result.unwrap_err().kind(), "illegal_transition");
                    assert_eq!(h.controller.current_phase().await.unwrap(), from);
                }
            }
        }
    }

    #[tokio::test]
    async fn rollback_edges_are_allowed() {
        let h = harness().await;
        h.controller
            .transition(RolloutPhase::GatedCreation, &admin(), "go")
            .await
            .unwrap();
        h.controller
            .transition(RolloutPhase::CaseOnlyMode, &admin(), "go further")
            .await
            .unwrap();
        let back = h
            .controller
            .transition(RolloutPhase::GatedCreation, &admin(), "too strict")
            .await
            .unwrap();
        assert_eq!(back.previous_phase, RolloutPhase::CaseOnlyMode);
    }

    #[tokio::test]
    async fn transition_requires_manage_phases_and_reason() {
        let h = harness().await;
        let err = h
            .controller
            .transition(RolloutPhase::GatedCreation, &Actor::new(2, Role::CaseManager), "go")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "access_denied");

        let err = h
            .controller
            .transition(RolloutPhase::GatedCreation, &admin(), "  ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(h.controller.current_phase().await.unwrap(), RolloutPhase::SoftWarnings);
    }

    #[tokio::test]
    async fn persistent_contention_reports_conflict() {
        let h = harness().await;
        h.config.set_contended(true);
        let err = h
            .controller
            .transition(RolloutPhase::GatedCreation, &admin(), "go")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[tokio::test]
    async fn compliance_follows_the_persisted_phase() {
        let h = harness().await;
        let decision = h
            .controller
            .check_compliance(GatedAction::SendMessage, false)
            .await
            .unwrap();
        assert!(decision.allowed && decision.warning.is_some());

        h.controller
            .transition(RolloutPhase::GatedCreation, &admin(), "go")
            .await
            .unwrap();
        let decision = h
            .controller
            .check_compliance(GatedAction::UploadDocument, false)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.error.as_deref(), Some(GATED_ERROR));
    }

    #[tokio::test]
    async fn empty_window_reports_zero_rates() {
        let h = harness().await;
        let metrics = h.controller.adoption_metrics(7).await.unwrap();
        assert_eq!(metrics.message_association_rate, 0);
        assert_eq!(metrics.document_association_rate, 0);
        assert!(metrics.daily_trend.is_empty());
    }

    #[tokio::test]
    async fn oversized_adoption_window_is_rejected() {
        let h = harness().await;
        let err = h.controller.adoption_metrics(u32::MAX).await.unwrap_err();
        assert_eq!(err.kind(), "validation");

        let metrics = h
            .controller
            .adoption_metrics(MAX_ADOPTION_WINDOW_DAYS)
            .await
            .unwrap();
        assert_eq!(metrics.period_days, MAX_ADOPTION_WINDOW_DAYS);
    }

    #[tokio::test]
    async fn adoption_metrics_cover_only_the_window() {
        let db = setup_backend().await;
        let controller = PhaseController::new(
            Arc::new(MemoryConfigStore::default()),
            Arc::new(db.backend.clone()),
            AuditLedger::disabled(),
        );
        let now = Utc::now();
        let key = {
            use crate::db::{CaseStore, NewCaseParams};
            use crate::enterprise::case_id;
            use crate::enterprise::types::{CaseStatus, PracticeArea};
            let identifier = case_id::generate(PracticeArea::Civil);
            let key = identifier.correlation_key;
            db.backend
                .insert_case(&NewCaseParams {
                    identifier,
                    title: "Window".to_string(),
                    description: None,
                    practice_area: PracticeArea::Civil,
                    status: CaseStatus::Open,
                    client_id: None,
                    assigned_lawyer_id: Some(1),
                    sla_deadline: None,
                    created_by: 1,
                })
                .await
                .unwrap();
            key
        };
        for (case_key, at) in [
            (Some(key), now),
            (Some(key), now),
            (None, now),
            (None, now - Duration::days(30)),
        ] {
            db.backend
                .insert_message(&NewMessageParams {
                    case_key,
                    display_id: None,
                    sender_id: 1,
                    sender_role: Role::Lawyer,
                    content: "x".to_string(),
                    is_internal_note: false,
                    created_at: at,
                })
                .await
                .unwrap();
        }

        let metrics = controller.adoption_metrics(7).await.unwrap();
        assert_eq!(metrics.total_messages, 3);
        assert_eq!(metrics.associated_messages, 2);
        assert_eq!(metrics.message_association_rate, 67);
        assert_eq!(metrics.daily_trend.len(), 1);

        let status = controller.status().await.unwrap();
        assert_eq!(status.metrics.message_association_rate, 50);
        assert_eq!(status.metrics.weekly_activity, 0);
        assert_eq!(
            status.recommendations,
            vec!["Low activity - monitor user engagement".to_string()]
        );
    }

    #[tokio::test]
    async fn schedule_defaults_and_round_trips() {
        let h = harness().await;
        assert_eq!(h.controller.schedule().await.unwrap(), PhaseSchedule::default());

        let schedule = PhaseSchedule {
            phase_1_duration: 21,
            ..PhaseSchedule::default()
        };
        h.controller.set_schedule(&admin(), &schedule).await.unwrap();
        assert_eq!(h.controller.schedule().await.unwrap(), schedule);

        let err = h
            .controller
            .set_schedule(&Actor::new(9, Role::Lawyer), &schedule)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "access_denied");
    }
}
