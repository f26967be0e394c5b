//! Enterprise case-management core.
//!
//! - [`case_id`]: secure display identifiers and correlation keys.
//! - [`migration`]: legacy case migration, rollback and validation.
//! - [`audit`]: checksummed, best-effort audit ledger.
//! - [`phase`]: rollout phase state machine and adoption metrics.
//! - [`rbac`]: role permissions and case access.
//! - [`desk`]: request-level case operations composed from the above.

pub mod audit;
pub mod case_id;
pub mod desk;
pub mod migration;
pub mod phase;
pub mod rbac;
pub mod types;

pub use audit::{AuditEntry, AuditLedger, IntegrityReport, NewAuditEntry, Provenance};
pub use case_id::{CaseIdentifier, CorrelationKey};
pub use desk::CaseDesk;
pub use migration::{MigrationEngine, MigrationOptions, MigrationResult, RollbackEntry};
pub use phase::{PhaseController, RolloutPhase};
pub use rbac::Actor;
