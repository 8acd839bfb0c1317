//! Scoring orchestrator.
//!
//! `IntelligenceService` composes the collaborator traits and exposes the
//! public computation entry points. Every call resolves tenant configuration
//! fresh, runs the pure aggregators over explicit inputs, appends an
//! immutable snapshot, and emits a timing/audit record. The service holds no
//! locks; concurrent calls for different entities interleave freely and
//! races on the same entity only add extra history rows.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::debug;

use super::aggregators;
use super::config::{resolve_config, IntelligenceConfig};
use super::domain::{
    ActivityEvent, DealId, LeadId, MeetingStatus, StageTransition, TaskStatus, TenantId, UserId,
};
use super::numeric::{
    self, clamp, normalize, wilson_interval, DisciplineFactors, LeadFactors, LeadTier,
};
use super::repository::{
    AuditEntry, AuditSink, CrmRepository, ModuleConfigStore, RepositoryError, SnapshotRepository,
};
use super::snapshot::{
    DisciplineIndexSnapshot, LeadScoreReasons, LeadScoreSnapshot, RiskFactors, RiskScore,
};

/// Trailing window for cohort conversion statistics.
pub(crate) const CONVERSION_COHORT_DAYS: i64 = 180;

/// Trailing window for discipline and performance aggregation.
pub(crate) const ACTIVITY_WINDOW_DAYS: i64 = 30;

/// Wilson interval confidence multiplier (95%).
const WILSON_Z: f64 = 1.96;

/// Tag marking an activity as a competitor sighting on a deal.
const COMPETITOR_TAG: &str = "competitor_flag";

/// Error raised by the intelligence entry points.
#[derive(Debug, thiserror::Error)]
pub enum IntelligenceError {
    #[error("{entity} {id} not found for tenant")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Deal probability result enriched with the persisted risk score.
#[derive(Debug, Clone, PartialEq)]
pub struct DealProbabilityOutcome {
    pub risk_score: RiskScore,
    pub probability: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
}

/// Facade composing the read repository, snapshot sink, config store, and
/// audit sink.
pub struct IntelligenceService<R, S, C, A> {
    pub(crate) crm: Arc<R>,
    pub(crate) snapshots: Arc<S>,
    pub(crate) config_store: Arc<C>,
    pub(crate) audit: Arc<A>,
}

impl<R, S, C, A> IntelligenceService<R, S, C, A>
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    pub fn new(crm: Arc<R>, snapshots: Arc<S>, config_store: Arc<C>, audit: Arc<A>) -> Self {
        Self {
            crm,
            snapshots,
            config_store,
            audit,
        }
    }

    pub(crate) fn resolve_config(
        &self,
        tenant: &TenantId,
    ) -> Result<IntelligenceConfig, RepositoryError> {
        resolve_config(self.config_store.as_ref(), tenant)
    }

    /// Audit failures are logged and swallowed; they never fail a scoring
    /// call.
    pub(crate) fn emit_audit(
        &self,
        tenant: &TenantId,
        action: &str,
        entity_type: &str,
        entity_id: Option<String>,
        metadata: serde_json::Value,
    ) {
        let entry = AuditEntry {
            tenant: tenant.clone(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            metadata,
        };
        if let Err(err) = self.audit.record(entry) {
            debug!(%err, action, "audit sink rejected entry");
        }
    }

    /// Score one lead and append an immutable [`LeadScoreSnapshot`].
    pub fn score_lead(
        &self,
        tenant: &TenantId,
        lead_id: &LeadId,
    ) -> Result<LeadScoreSnapshot, IntelligenceError> {
        let started = Instant::now();
        let now = Utc::now();
        let config = self.resolve_config(tenant)?;

        let input = self
            .crm
            .lead_scoring_input(tenant, lead_id)?
            .ok_or_else(|| IntelligenceError::NotFound {
                entity: "lead",
                id: lead_id.0.clone(),
            })?;

        let cohort_start = now - Duration::days(CONVERSION_COHORT_DAYS);
        let cohort = self
            .crm
            .leads_by_source_since(tenant, &input.lead.source, cohort_start)?;
        let conversion_rate = if cohort.is_empty() {
            0.0
        } else {
            cohort
                .iter()
                .filter(|lead| lead.converted_at.is_some())
                .count() as f64
                / cohort.len() as f64
        };

        let velocity_hours = average_transition_hours(&input.stage_history);

        let factors = LeadFactors {
            demographic: aggregators::demographic_score(&input.lead, &config.classification),
            engagement: aggregators::engagement_score(&input.activities, &config, now),
            behavioral: aggregators::behavioral_score(&input, &config.targets, now),
            historical: aggregators::historical_score(conversion_rate, velocity_hours),
        };

        let scored = numeric::score_lead(&factors, &config.lead_score_weights);
        // The primitive buckets at fixed 80/60; tenant thresholds re-bucket
        // the same score here.
        let tier = LeadTier::from_score(scored.score, config.thresholds.hot, config.thresholds.warm);

        let snapshot = LeadScoreSnapshot {
            tenant: tenant.clone(),
            lead: lead_id.clone(),
            score: scored.score,
            tier,
            reasons: LeadScoreReasons {
                factors,
                tier,
                conversion_rate,
                velocity_hours,
            },
            created_at: now,
        };

        let stored = self.snapshots.append_lead_score(snapshot)?;

        self.emit_audit(
            tenant,
            "lead_scored",
            "lead",
            Some(lead_id.0.clone()),
            json!({
                "score": stored.score,
                "tier": stored.tier.label(),
                "elapsed_ms": started.elapsed().as_millis() as u64,
            }),
        );

        Ok(stored)
    }

    /// Compute a user's discipline index over the trailing 30-day window and
    /// append an immutable [`DisciplineIndexSnapshot`].
    pub fn compute_discipline_index(
        &self,
        tenant: &TenantId,
        user_id: &UserId,
    ) -> Result<DisciplineIndexSnapshot, IntelligenceError> {
        let started = Instant::now();
        let now = Utc::now();
        let config = self.resolve_config(tenant)?;
        let window_start = now - Duration::days(ACTIVITY_WINDOW_DAYS);

        let input = self
            .crm
            .discipline_input(tenant, user_id, window_start)?
            .ok_or_else(|| IntelligenceError::NotFound {
                entity: "user",
                id: user_id.0.clone(),
            })?;

        let targets = &config.targets;

        let touches = input.calls.len() + input.tasks.len();
        let follow_up = normalize(touches as f64, 0.0, targets.monthly_follow_up_target);

        let meeting_adherence = completion_rate_or_neutral(
            input
                .organized_meetings
                .iter()
                .filter(|meeting| meeting.status == MeetingStatus::Completed)
                .count(),
            input.organized_meetings.len(),
        );

        let task_completion = completion_rate_or_neutral(
            input
                .tasks
                .iter()
                .filter(|task| task.status == TaskStatus::Completed)
                .count(),
            input.tasks.len(),
        );

        let data_entry = if input.first_touch_hours.is_empty() {
            50.0
        } else {
            let avg_hours: f64 = input.first_touch_hours.iter().sum::<f64>()
                / input.first_touch_hours.len() as f64;
            data_entry_score(avg_hours, targets.data_entry_target_hours, targets.data_entry_max_hours)
        };

        let pipeline_hygiene = if input.assigned_leads.is_empty() {
            50.0
        } else {
            let hygiene_start = now - Duration::days(targets.hygiene_window_days);
            let fresh = input
                .assigned_leads
                .iter()
                .filter(|lead| lead.updated_at >= hygiene_start)
                .count() as f64;
            clamp(fresh / input.assigned_leads.len() as f64 * 100.0)
        };

        let factors = DisciplineFactors {
            follow_up,
            meeting_adherence,
            task_completion,
            data_entry,
            pipeline_hygiene,
        };
        let score = numeric::score_discipline(&factors, &config.discipline_weights);

        let snapshot = DisciplineIndexSnapshot {
            tenant: tenant.clone(),
            user: user_id.clone(),
            snapshot_date: now.date_naive(),
            score,
            factors,
            created_at: now,
        };

        let stored = self.snapshots.append_discipline_index(snapshot)?;

        self.emit_audit(
            tenant,
            "discipline_indexed",
            "user",
            Some(user_id.0.clone()),
            json!({
                "score": stored.score,
                "elapsed_ms": started.elapsed().as_millis() as u64,
            }),
        );

        Ok(stored)
    }

    /// Model the win probability of one deal and append an immutable
    /// [`RiskScore`] with Wilson confidence bounds.
    pub fn compute_deal_probability(
        &self,
        tenant: &TenantId,
        deal_id: &DealId,
    ) -> Result<DealProbabilityOutcome, IntelligenceError> {
        let started = Instant::now();
        let now = Utc::now();
        let config = self.resolve_config(tenant)?;

        let input = self
            .crm
            .deal_probability_input(tenant, deal_id)?
            .ok_or_else(|| IntelligenceError::NotFound {
                entity: "deal",
                id: deal_id.0.clone(),
            })?;

        let deal = &input.deal;
        let all_deals = self.crm.deals(tenant)?;
        let cohort: Vec<_> = all_deals
            .iter()
            .filter(|candidate| {
                candidate.stage == deal.stage
                    && candidate.closed_at.is_some()
                    && candidate.id != deal.id
            })
            .collect();

        let stage_base = config.stage_probabilities.for_stage(deal.stage);

        let size_factor = {
            let avg_value = mean(cohort.iter().map(|candidate| candidate.value));
            match avg_value {
                Some(avg) if avg > 0.0 => clamp(50.0 * deal.value / avg),
                _ => 50.0,
            }
        };

        let velocity_factor = {
            let avg_cycle_hours = mean(cohort.iter().filter_map(|candidate| {
                candidate
                    .closed_at
                    .map(|closed| (closed - candidate.opened_at).num_seconds() as f64 / 3600.0)
            }));
            let age_hours = (now - deal.opened_at).num_seconds() as f64 / 3600.0;
            match avg_cycle_hours {
                Some(avg) if avg > 0.0 => clamp(100.0 - 50.0 * age_hours / avg),
                _ => 50.0,
            }
        };

        let engagement_factor =
            normalize((input.contacts.len() + input.meetings.len()) as f64, 0.0, 10.0);

        let competitor_penalty = if input.activities.iter().any(|activity| {
            activity
                .tags
                .iter()
                .any(|tag| tag.eq_ignore_ascii_case(COMPETITOR_TAG))
        }) {
            -15.0
        } else {
            0.0
        };

        let probability = clamp(
            stage_base
                + 0.3 * size_factor
                + 0.25 * velocity_factor
                + 0.2 * engagement_factor
                + competitor_penalty,
        );

        let wins = cohort
            .iter()
            .filter(|candidate| candidate.status == super::domain::DealStatus::Won)
            .count() as u64;
        let sample_size = cohort.len() as u64;
        let interval = wilson_interval(wins, sample_size, WILSON_Z);

        let snapshot = RiskScore {
            tenant: tenant.clone(),
            lead: deal.lead.clone(),
            score: probability,
            factors: RiskFactors {
                deal: deal.id.clone(),
                stage: deal.stage,
                probability,
                confidence_low: interval.low,
                confidence_high: interval.high,
                sample_size,
            },
            created_at: now,
        };

        let stored = self.snapshots.append_risk_score(snapshot)?;

        self.emit_audit(
            tenant,
            "deal_probability_modeled",
            "deal",
            Some(deal_id.0.clone()),
            json!({
                "probability": probability,
                "sample_size": sample_size,
                "elapsed_ms": started.elapsed().as_millis() as u64,
            }),
        );

        Ok(DealProbabilityOutcome {
            probability: stored.score,
            confidence_low: stored.factors.confidence_low,
            confidence_high: stored.factors.confidence_high,
            risk_score: stored,
        })
    }

    /// Append one engagement activity for a lead. Rescoring is queued by the
    /// caller through the trigger dispatcher, not here.
    pub fn record_engagement_event(
        &self,
        tenant: &TenantId,
        lead_id: &LeadId,
        event_type: &str,
    ) -> Result<ActivityEvent, IntelligenceError> {
        let event = ActivityEvent {
            lead: Some(lead_id.clone()),
            event_type: event_type.to_string(),
            tags: Vec::new(),
            at: Utc::now(),
        };
        self.crm.append_engagement(tenant, event.clone())?;

        self.emit_audit(
            tenant,
            "engagement_recorded",
            "lead",
            Some(lead_id.0.clone()),
            json!({ "event_type": event_type }),
        );

        Ok(event)
    }
}

/// Average hours between consecutive stage transitions, `None` below two
/// transitions.
pub(crate) fn average_transition_hours(history: &[StageTransition]) -> Option<f64> {
    if history.len() < 2 {
        return None;
    }

    let mut ordered: Vec<DateTime<Utc>> = history.iter().map(|transition| transition.at).collect();
    ordered.sort();

    let gaps: Vec<f64> = ordered
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_seconds() as f64 / 3600.0)
        .collect();

    Some(gaps.iter().sum::<f64>() / gaps.len() as f64)
}

fn completion_rate_or_neutral(completed: usize, total: usize) -> f64 {
    if total == 0 {
        50.0
    } else {
        clamp(completed as f64 / total as f64 * 100.0)
    }
}

/// Full marks at or below the target latency, tapering to zero at the cap.
fn data_entry_score(avg_hours: f64, target_hours: f64, max_hours: f64) -> f64 {
    if max_hours <= target_hours {
        return if avg_hours <= target_hours { 100.0 } else { 0.0 };
    }
    clamp((max_hours - avg_hours) / (max_hours - target_hours) * 100.0)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        None
    } else {
        Some(collected.iter().sum::<f64>() / collected.len() as f64)
    }
}
