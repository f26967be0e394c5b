//! Error types for the enterprise core.

use crate::enterprise::phase::RolloutPhase;

/// Configuration resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("failed to parse settings file {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Admin gateway startup errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway failed to start: {reason}")]
    StartupFailed { reason: String },
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

impl From<libsql::Error> for DatabaseError {
    fn from(err: libsql::Error) -> Self {
        let message = err.to_string();
        if message.contains("UNIQUE constraint failed") {
            Self::Constraint(message)
        } else {
            Self::Query(message)
        }
    }
}

/// Rejections surfaced to callers of the enterprise core.
///
/// Every variant carries a human-readable message through `Display` and a
/// stable machine-readable identifier through [`EnterpriseError::kind`].
#[derive(Debug, thiserror::Error)]
pub enum EnterpriseError {
    #[error("Invalid practice area: {0}")]
    InvalidPracticeArea(String),

    #[error("Invalid Case ID format: {0}")]
    InvalidIdentifierFormat(String),

    #[error("Invalid transition from {from} to {to}")]
    IllegalTransition { from: RolloutPhase, to: RolloutPhase },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("{0}")]
    PhaseRejected(String),

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("Case not found: {0}")]
    CaseNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl EnterpriseError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPracticeArea(_) => "invalid_practice_area",
            Self::InvalidIdentifierFormat(_) => "invalid_identifier_format",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::AccessDenied(_) => "access_denied",
            Self::PhaseRejected(_) => "phase_rejected",
            Self::Validation { .. } => "validation",
            Self::CaseNotFound(_) | Self::DocumentNotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Database(_) => "database",
        }
    }

    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Reading or writing a migration rollback file.
#[derive(Debug, thiserror::Error)]
pub enum RollbackFileError {
    #[error("rollback file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rollback file {path} is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of the end-to-end enterprise migration run.
#[derive(Debug, thiserror::Error)]
pub enum MigrationRunError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    RollbackFile(#[from] RollbackFileError),
}

/// Audit ledger write failures. Only ever logged, never returned to the
/// caller of the audited operation.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit write failed: {0}")]
    WriteFailure(#[from] DatabaseError),

    #[error("audit entry could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_identifiers() {
        let err = EnterpriseError::IllegalTransition {
            from: RolloutPhase::SoftWarnings,
            to: RolloutPhase::CaseOnlyMode,
        };
        assert_eq!(err.kind(), "illegal_transition");
        assert_eq!(
            err.to_string(),
            "Invalid transition from SOFT_WARNINGS to CASE_ONLY_MODE"
        );
        assert_eq!(
            EnterpriseError::validation("reason", "required").kind(),
            "validation"
        );
    }

    #[test]
    fn database_errors_convert_transparently() {
        let err: EnterpriseError = DatabaseError::Query("boom".to_string()).into();
        assert_eq!(err.kind(), "database");
        assert_eq!(err.to_string(), "query failed: boom");
    }
}
