//! Fire-and-forget recomputation triggers.
//!
//! CRUD controllers emit domain events; the dispatcher maps each event to
//! the recomputations that keep snapshots fresh. `queue_trigger` returns
//! immediately: the work happens on a spawned worker task, and failures are
//! audited and swallowed so a broken recomputation can never surface on the
//! write path. There is no dedup, no retry, and no queue persistence; a
//! burst of identical events produces a burst of redundant recomputations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::warn;

use super::domain::{DealId, LeadId, TenantId, UserId};
use super::repository::{AuditSink, CrmRepository, ModuleConfigStore, SnapshotRepository};
use super::scoring::{IntelligenceError, IntelligenceService};

/// Domain event kinds the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    LeadChanged,
    LeadEngaged,
    DealChanged,
    MeetingChanged,
    TaskChanged,
    PipelineChanged,
}

impl TriggerKind {
    pub const fn label(self) -> &'static str {
        match self {
            TriggerKind::LeadChanged => "lead_changed",
            TriggerKind::LeadEngaged => "lead_engaged",
            TriggerKind::DealChanged => "deal_changed",
            TriggerKind::MeetingChanged => "meeting_changed",
            TriggerKind::TaskChanged => "task_changed",
            TriggerKind::PipelineChanged => "pipeline_changed",
        }
    }
}

/// Ephemeral recomputation instruction; consumed once, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceTrigger {
    pub kind: TriggerKind,
    pub tenant: TenantId,
    pub lead: Option<LeadId>,
    pub deal: Option<DealId>,
    pub user: Option<UserId>,
}

/// Handle for queueing triggers. Cloneable and cheap; dropping every handle
/// shuts the worker down once the queue drains.
#[derive(Clone)]
pub struct TriggerDispatcher {
    tx: mpsc::UnboundedSender<IntelligenceTrigger>,
}

impl TriggerDispatcher {
    /// Spawn the worker task draining the trigger queue against `service`.
    pub fn spawn<R, S, C, A>(service: Arc<IntelligenceService<R, S, C, A>>) -> Self
    where
        R: CrmRepository + 'static,
        S: SnapshotRepository + 'static,
        C: ModuleConfigStore + 'static,
        A: AuditSink + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<IntelligenceTrigger>();

        tokio::spawn(async move {
            while let Some(trigger) = rx.recv().await {
                process_trigger(service.as_ref(), &trigger);
            }
        });

        Self { tx }
    }

    /// Enqueue a trigger without waiting for the recomputation. Never
    /// blocks and never fails the caller; a closed queue is logged.
    pub fn queue_trigger(&self, trigger: IntelligenceTrigger) {
        if self.tx.send(trigger).is_err() {
            warn!("trigger queue closed, event dropped");
        }
    }
}

/// Map one trigger to its recomputations. Every failure is converted to an
/// audit entry; nothing propagates.
fn process_trigger<R, S, C, A>(
    service: &IntelligenceService<R, S, C, A>,
    trigger: &IntelligenceTrigger,
) where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    let tenant = &trigger.tenant;

    let mut outcomes: Vec<(&'static str, Result<(), IntelligenceError>)> = Vec::new();

    match trigger.kind {
        TriggerKind::LeadChanged => {
            if let Some(lead) = &trigger.lead {
                outcomes.push(("score_lead", service.score_lead(tenant, lead).map(|_| ())));
            }
            if let Some(user) = &trigger.user {
                outcomes.push((
                    "discipline_index",
                    service.compute_discipline_index(tenant, user).map(|_| ()),
                ));
            }
        }
        TriggerKind::LeadEngaged => {
            if let Some(lead) = &trigger.lead {
                outcomes.push(("score_lead", service.score_lead(tenant, lead).map(|_| ())));
            }
        }
        TriggerKind::DealChanged => {
            if let Some(deal) = &trigger.deal {
                outcomes.push((
                    "deal_probability",
                    service.compute_deal_probability(tenant, deal).map(|_| ()),
                ));
            }
            outcomes.push((
                "revenue_forecast",
                service.compute_revenue_forecast(tenant).map(|_| ()),
            ));
        }
        TriggerKind::MeetingChanged => {
            if let Some(user) = &trigger.user {
                outcomes.push((
                    "discipline_index",
                    service.compute_discipline_index(tenant, user).map(|_| ()),
                ));
            }
        }
        TriggerKind::TaskChanged => {
            outcomes.push((
                "reminder_priorities",
                service
                    .compute_reminder_priorities(tenant, trigger.user.as_ref())
                    .map(|_| ()),
            ));
        }
        TriggerKind::PipelineChanged => {
            outcomes.push((
                "revenue_forecast",
                service.compute_revenue_forecast(tenant).map(|_| ()),
            ));
            outcomes.push((
                "performance_ranking",
                service.compute_performance_ranking(tenant).map(|_| ()),
            ));
        }
    }

    for (computation, outcome) in outcomes {
        if let Err(err) = outcome {
            warn!(
                trigger = trigger.kind.label(),
                computation,
                %err,
                "trigger recomputation failed"
            );
            service.emit_audit(
                tenant,
                "trigger_failed",
                "trigger",
                None,
                json!({
                    "trigger": trigger.kind.label(),
                    "computation": computation,
                    "error": err.to_string(),
                }),
            );
        }
    }
}
