use std::sync::Arc;

use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::json;

use estate_intel::error::AppError;
use estate_intel::intelligence::{
    intelligence_router, AuditSink, CrmRepository, IntelligenceError, IntelligenceState,
    ModuleConfigStore, ReminderEngine, SnapshotRepository, TenantId,
};

use crate::infra::{AppState, ConsoleNotificationSender, InMemoryCrmStore, TracingAuditSink};

pub(crate) type SweepEngine =
    ReminderEngine<InMemoryCrmStore, ConsoleNotificationSender, TracingAuditSink>;

pub(crate) fn with_intelligence_routes<R, S, C, A>(
    state: IntelligenceState<R, S, C, A>,
) -> axum::Router
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    intelligence_router(state)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/tenants/:tenant/reminders/sweep",
            axum::routing::post(sweep_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn sweep_endpoint(
    Path(tenant): Path<String>,
    Extension(engine): Extension<Arc<SweepEngine>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let summary = engine
        .run_reminder_sweep(&TenantId(tenant))
        .map_err(IntelligenceError::from)?;

    Ok(Json(json!({
        "reminders_sent": summary.reminders_sent,
        "warnings_sent": summary.warnings_sent,
        "deduplicated": summary.deduplicated,
        "delivery_failures": summary.delivery_failures,
    })))
}
