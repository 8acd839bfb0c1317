//! HTTP surface for the intelligence entry points.
//!
//! Thin adapters only: tenant scoping comes from the path, computation
//! results are returned as JSON, and `NotFound` maps to 404. Auth and
//! permission middleware live outside this crate.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{DealId, DealStage, LeadId, TenantId, UserId};
use super::repository::{AuditSink, CrmRepository, ModuleConfigStore, SnapshotRepository};
use super::scoring::{IntelligenceError, IntelligenceService};
use super::triggers::{IntelligenceTrigger, TriggerDispatcher, TriggerKind};

/// Shared router state: the computation facade plus the trigger queue.
pub struct IntelligenceState<R, S, C, A> {
    pub service: Arc<IntelligenceService<R, S, C, A>>,
    pub dispatcher: TriggerDispatcher,
}

impl<R, S, C, A> Clone for IntelligenceState<R, S, C, A> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

/// Router builder exposing the intelligence computations.
pub fn intelligence_router<R, S, C, A>(state: IntelligenceState<R, S, C, A>) -> Router
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/tenants/:tenant/leads/:lead/score",
            post(score_lead_handler::<R, S, C, A>),
        )
        .route(
            "/api/v1/tenants/:tenant/leads/:lead/engagement",
            post(engagement_handler::<R, S, C, A>),
        )
        .route(
            "/api/v1/tenants/:tenant/leads/:lead/scripts",
            post(scripts_handler::<R, S, C, A>),
        )
        .route(
            "/api/v1/tenants/:tenant/users/:user/discipline",
            post(discipline_handler::<R, S, C, A>),
        )
        .route(
            "/api/v1/tenants/:tenant/deals/:deal/probability",
            post(probability_handler::<R, S, C, A>),
        )
        .route(
            "/api/v1/tenants/:tenant/forecast/revenue",
            post(forecast_handler::<R, S, C, A>),
        )
        .route(
            "/api/v1/tenants/:tenant/rankings/reminders",
            post(reminders_handler::<R, S, C, A>),
        )
        .route(
            "/api/v1/tenants/:tenant/rankings/performance",
            post(performance_handler::<R, S, C, A>),
        )
        .route(
            "/api/v1/tenants/:tenant/triggers",
            post(trigger_handler::<R, S, C, A>),
        )
        .with_state(state)
}

fn error_response(err: IntelligenceError) -> Response {
    let status = match err {
        IntelligenceError::NotFound { .. } => StatusCode::NOT_FOUND,
        IntelligenceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}

async fn score_lead_handler<R, S, C, A>(
    State(state): State<IntelligenceState<R, S, C, A>>,
    Path((tenant, lead)): Path<(String, String)>,
) -> Response
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    match state
        .service
        .score_lead(&TenantId(tenant), &LeadId(lead))
    {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct EngagementBody {
    event_type: String,
}

async fn engagement_handler<R, S, C, A>(
    State(state): State<IntelligenceState<R, S, C, A>>,
    Path((tenant, lead)): Path<(String, String)>,
    Json(body): Json<EngagementBody>,
) -> Response
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    let tenant = TenantId(tenant);
    let lead = LeadId(lead);
    match state
        .service
        .record_engagement_event(&tenant, &lead, &body.event_type)
    {
        Ok(event) => {
            // Rescoring happens off the write path.
            state.dispatcher.queue_trigger(IntelligenceTrigger {
                kind: TriggerKind::LeadEngaged,
                tenant,
                lead: Some(lead),
                deal: None,
                user: None,
            });
            (StatusCode::ACCEPTED, Json(event)).into_response()
        }
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct ScriptQuery {
    stage: Option<DealStage>,
}

async fn scripts_handler<R, S, C, A>(
    State(state): State<IntelligenceState<R, S, C, A>>,
    Path((tenant, lead)): Path<(String, String)>,
    Query(query): Query<ScriptQuery>,
) -> Response
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    match state
        .service
        .generate_scripts(&TenantId(tenant), &LeadId(lead), query.stage)
    {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn discipline_handler<R, S, C, A>(
    State(state): State<IntelligenceState<R, S, C, A>>,
    Path((tenant, user)): Path<(String, String)>,
) -> Response
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    match state
        .service
        .compute_discipline_index(&TenantId(tenant), &UserId(user))
    {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn probability_handler<R, S, C, A>(
    State(state): State<IntelligenceState<R, S, C, A>>,
    Path((tenant, deal)): Path<(String, String)>,
) -> Response
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    match state
        .service
        .compute_deal_probability(&TenantId(tenant), &DealId(deal))
    {
        Ok(outcome) => {
            let payload = json!({
                "risk_score": outcome.risk_score,
                "probability": outcome.probability,
                "confidence_low": outcome.confidence_low,
                "confidence_high": outcome.confidence_high,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn forecast_handler<R, S, C, A>(
    State(state): State<IntelligenceState<R, S, C, A>>,
    Path(tenant): Path<String>,
) -> Response
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    match state.service.compute_revenue_forecast(&TenantId(tenant)) {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct ReminderQuery {
    user: Option<String>,
}

async fn reminders_handler<R, S, C, A>(
    State(state): State<IntelligenceState<R, S, C, A>>,
    Path(tenant): Path<String>,
    Query(query): Query<ReminderQuery>,
) -> Response
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    let user = query.user.map(UserId);
    match state
        .service
        .compute_reminder_priorities(&TenantId(tenant), user.as_ref())
    {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn performance_handler<R, S, C, A>(
    State(state): State<IntelligenceState<R, S, C, A>>,
    Path(tenant): Path<String>,
) -> Response
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    match state.service.compute_performance_ranking(&TenantId(tenant)) {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct TriggerBody {
    kind: TriggerKind,
    lead: Option<String>,
    deal: Option<String>,
    user: Option<String>,
}

async fn trigger_handler<R, S, C, A>(
    State(state): State<IntelligenceState<R, S, C, A>>,
    Path(tenant): Path<String>,
    Json(body): Json<TriggerBody>,
) -> Response
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    state.dispatcher.queue_trigger(IntelligenceTrigger {
        kind: body.kind,
        tenant: TenantId(tenant),
        lead: body.lead.map(LeadId),
        deal: body.deal.map(DealId),
        user: body.user.map(UserId),
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "queued": body.kind.label() })),
    )
        .into_response()
}
