//! Request and response DTOs for the admin gateway API.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::enterprise::audit::IntegrityReport;
use crate::error::{DatabaseError, EnterpriseError};

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub uptime_secs: u64,
}

// --- Phase ---

#[derive(Debug, Default, Deserialize)]
pub struct AdoptionQuery {
    pub days: Option<u32>,
}

// --- Cases ---

#[derive(Debug, Default, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: Option<String>,
    pub reason: Option<String>,
}

// --- Audit ---

#[derive(Debug, Default, Deserialize)]
pub struct AuditVerifyQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AuditVerifyResponse {
    pub intact: bool,
    #[serde(flatten)]
    pub report: IntegrityReport,
}

// --- Extractors ---

/// JSON request body whose rejection renders as an [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejection renders as an [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

// --- Errors ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub error: String,
}

/// Handler error rendered as `{kind, error}` JSON.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "unauthenticated",
            message: message.into(),
        }
    }
}

fn status_for(err: &EnterpriseError) -> StatusCode {
    match err {
        EnterpriseError::InvalidIdentifierFormat(_)
        | EnterpriseError::InvalidPracticeArea(_)
        | EnterpriseError::Validation { .. }
        | EnterpriseError::IllegalTransition { .. } => StatusCode::BAD_REQUEST,
        EnterpriseError::AccessDenied(_) | EnterpriseError::PhaseRejected(_) => {
            StatusCode::FORBIDDEN
        }
        EnterpriseError::CaseNotFound(_) | EnterpriseError::DocumentNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        EnterpriseError::Conflict(_) => StatusCode::CONFLICT,
        EnterpriseError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<EnterpriseError> for ApiError {
    fn from(err: EnterpriseError) -> Self {
        let status = status_for(&err);
        let message = match &err {
            EnterpriseError::Database(e) => {
                tracing::error!("Gateway request failed on the database: {}", e);
                "Internal database error".to_string()
            }
            other => other.to_string(),
        };
        Self {
            status,
            kind: err.kind(),
            message,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            kind: "invalid_request",
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: rejection.status(),
            kind: "invalid_request",
            message: rejection.body_text(),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        EnterpriseError::Database(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                kind: self.kind.to_string(),
                error: self.message,
            }),
        )
            .into_response()
    }
}
