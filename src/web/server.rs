//! Axum HTTP server for the admin gateway.
//!
//! Handles phase administration, case desk operations and ledger
//! verification. Everything except health sits behind bearer auth.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::{StatusCode, header},
    middleware,
    routing::{get, post},
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::app::Components;
use crate::db::AuditQuery;
use crate::enterprise::audit::AuditLedger;
use crate::enterprise::desk::{
    ActivityOutcome, CaseDesk, CaseView, DocumentDraft, DocumentView, MessageDraft, NewCaseRequest,
};
use crate::enterprise::phase::{
    AdoptionMetrics, DEFAULT_ADOPTION_WINDOW_DAYS, PhaseController, PhaseSchedule, PhaseStatus,
    PhaseTransition, TransitionRequest,
};
use crate::enterprise::rbac::require_permission;
use crate::enterprise::types::{CaseStatus, Permission};
use crate::error::{EnterpriseError, GatewayError};
use crate::web::auth::{AuthState, Caller, auth_middleware};
use crate::web::types::*;

/// Shared state for all gateway handlers.
pub struct GatewayState {
    pub phases: Arc<PhaseController>,
    pub desk: Arc<CaseDesk>,
    pub ledger: AuditLedger,
    /// Server startup time for uptime calculation.
    pub startup_time: Instant,
}

impl GatewayState {
    pub fn from_components(components: &Components) -> Self {
        Self {
            phases: components.phases.clone(),
            desk: components.desk.clone(),
            ledger: components.ledger.clone(),
            startup_time: Instant::now(),
        }
    }
}

/// A running gateway. Dropping it leaves the server running until the
/// process exits.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::warn!("Admin gateway task ended abnormally: {}", e);
        }
    }
}

/// Build the gateway router without binding a socket.
pub fn router(state: Arc<GatewayState>, auth: AuthState) -> Router {
    // Public routes (no auth)
    let public = Router::new().route("/api/health", get(health_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        // Phase
        .route("/api/phase/status", get(phase_status_handler))
        .route("/api/phase/transition", post(phase_transition_handler))
        .route("/api/phase/adoption", get(phase_adoption_handler))
        .route(
            "/api/phase/schedule",
            get(phase_schedule_get_handler).put(phase_schedule_set_handler),
        )
        // Cases
        .route("/api/cases", get(cases_list_handler).post(cases_create_handler))
        .route(
            "/api/cases/{case_id}",
            get(cases_detail_handler).delete(cases_delete_handler),
        )
        .route("/api/cases/{case_id}/status", post(cases_status_handler))
        // Activity
        .route("/api/messages", post(messages_send_handler))
        .route("/api/documents", post(documents_upload_handler))
        .route("/api/documents/{id}", get(documents_download_handler))
        // Audit
        .route("/api/audit/verify", get(audit_verify_handler))
        .route_layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            header::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            header::HeaderValue::from_static("DENY"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// The handle carries the actual bound address (useful when binding to
/// port 0).
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<GatewayState>,
    auth: AuthState,
) -> Result<ServerHandle, GatewayError> {
    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::StartupFailed {
                reason: format!("Failed to bind to {}: {}", addr, e),
            })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| GatewayError::StartupFailed {
            reason: format!("Failed to get local addr: {}", e),
        })?;

    let app = router(state, auth);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Admin gateway shutting down");
            })
            .await
        {
            tracing::error!("Admin gateway server error: {}", e);
        }
    });

    tracing::info!(addr = %bound_addr, "Admin gateway listening");
    Ok(ServerHandle {
        addr: bound_addr,
        shutdown_tx,
        task,
    })
}

// --- Health ---

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "enterprise-gateway",
        uptime_secs: state.startup_time.elapsed().as_secs(),
    })
}

// --- Phase handlers ---

async fn phase_status_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(_actor): Caller,
) -> Result<Json<PhaseStatus>, ApiError> {
    Ok(Json(state.phases.status().await?))
}

async fn phase_transition_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(actor): Caller,
    ApiJson(body): ApiJson<TransitionRequest>,
) -> Result<Json<PhaseTransition>, ApiError> {
    require_permission(&actor, Permission::ManagePhases)?;
    let (target, reason) = body.parse()?;
    let transition = state.phases.transition(target, &actor, &reason).await?;
    Ok(Json(transition))
}

async fn phase_adoption_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(actor): Caller,
    ApiQuery(query): ApiQuery<AdoptionQuery>,
) -> Result<Json<AdoptionMetrics>, ApiError> {
    require_permission(&actor, Permission::ViewReports)?;
    let days = query.days.unwrap_or(DEFAULT_ADOPTION_WINDOW_DAYS);
    Ok(Json(state.phases.adoption_metrics(days).await?))
}

async fn phase_schedule_get_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(_actor): Caller,
) -> Result<Json<PhaseSchedule>, ApiError> {
    Ok(Json(state.phases.schedule().await?))
}

async fn phase_schedule_set_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(actor): Caller,
    ApiJson(schedule): ApiJson<PhaseSchedule>,
) -> Result<Json<PhaseSchedule>, ApiError> {
    state.phases.set_schedule(&actor, &schedule).await?;
    Ok(Json(schedule))
}

// --- Case handlers ---

async fn cases_list_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(actor): Caller,
) -> Result<Json<Vec<CaseView>>, ApiError> {
    Ok(Json(state.desk.list_cases(&actor).await?))
}

async fn cases_create_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(actor): Caller,
    ApiJson(body): ApiJson<NewCaseRequest>,
) -> Result<(StatusCode, Json<CaseView>), ApiError> {
    let case = state.desk.create_case(&actor, body).await?;
    Ok((StatusCode::CREATED, Json(case)))
}

async fn cases_detail_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(actor): Caller,
    Path(case_id): Path<String>,
) -> Result<Json<CaseView>, ApiError> {
    Ok(Json(state.desk.get_case(&actor, &case_id).await?))
}

async fn cases_delete_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(actor): Caller,
    Path(case_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.desk.delete_case(&actor, &case_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cases_status_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(actor): Caller,
    Path(case_id): Path<String>,
    ApiJson(body): ApiJson<StatusUpdateRequest>,
) -> Result<Json<CaseView>, ApiError> {
    let status = body
        .status
        .as_deref()
        .map(|raw| raw.trim().to_ascii_uppercase())
        .and_then(|raw| CaseStatus::from_db_value(&raw))
        .ok_or_else(|| {
            EnterpriseError::validation("status", "Expected OPEN, IN_PROGRESS, CLOSED or ON_HOLD")
        })?;
    let case = state
        .desk
        .update_status(&actor, &case_id, status, body.reason.as_deref())
        .await?;
    Ok(Json(case))
}

// --- Activity handlers ---

async fn messages_send_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(actor): Caller,
    ApiJson(draft): ApiJson<MessageDraft>,
) -> Result<(StatusCode, Json<ActivityOutcome>), ApiError> {
    let outcome = state.desk.send_message(&actor, draft).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn documents_upload_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(actor): Caller,
    ApiJson(draft): ApiJson<DocumentDraft>,
) -> Result<(StatusCode, Json<ActivityOutcome>), ApiError> {
    let outcome = state.desk.upload_document(&actor, draft).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn documents_download_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(actor): Caller,
    Path(id): Path<i64>,
) -> Result<Json<DocumentView>, ApiError> {
    Ok(Json(state.desk.download_document(&actor, id).await?))
}

// --- Audit handlers ---

async fn audit_verify_handler(
    State(state): State<Arc<GatewayState>>,
    Caller(actor): Caller,
    ApiQuery(query): ApiQuery<AuditVerifyQuery>,
) -> Result<Json<AuditVerifyResponse>, ApiError> {
    require_permission(&actor, Permission::ViewAuditLogs)?;
    let report = state
        .ledger
        .verify_stored(&AuditQuery {
            limit: query.limit,
            ..Default::default()
        })
        .await?;
    Ok(Json(AuditVerifyResponse {
        intact: report.is_intact(),
        report,
    }))
}
