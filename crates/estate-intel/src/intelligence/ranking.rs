//! Ranking builders: reminder priorities, performance ranking, and the
//! templated call-script generator. All three persist their output through
//! the generic ranking snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{DealId, DealStage, DealStatus, LeadId, TenantId, UserId};
use super::numeric::normalize;
use super::repository::{AuditSink, CrmRepository, ModuleConfigStore, SnapshotRepository};
use super::scoring::{IntelligenceError, IntelligenceService, ACTIVITY_WINDOW_DAYS};
use super::snapshot::{RankingKind, RankingSnapshot};

/// Look-ahead horizon for reminder candidates.
const REMINDER_HORIZON_DAYS: i64 = 7;

/// Hours-to-due range mapped onto the urgency scale.
const URGENCY_WINDOW_HOURS: f64 = 168.0;

/// Deal value corresponding to maximal impact.
const IMPACT_CEILING: f64 = 2_000_000.0;

/// Reminder list is truncated to this many entries.
const REMINDER_LIMIT: usize = 25;

/// One prioritized reminder entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPriority {
    pub title: String,
    pub kind: ReminderKind,
    pub due_at: DateTime<Utc>,
    pub urgency: f64,
    pub impact: f64,
    pub priority: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Task,
    Deadline,
}

/// One row of the 30-day performance ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    pub user: UserId,
    pub name: String,
    pub score: f64,
    pub revenue: f64,
    pub pipeline_value: f64,
    pub conversion_rate: f64,
    pub activity_count: u64,
    pub reschedule_rate: f64,
}

fn deal_value_lookup(
    deals: &[super::domain::DealRecord],
) -> BTreeMap<&DealId, f64> {
    deals.iter().map(|deal| (&deal.id, deal.value)).collect()
}

fn urgency(due_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours_to_due = (due_at - now).num_seconds() as f64 / 3600.0;
    // Overdue items clamp to maximal urgency through the normalize guard.
    100.0 - normalize(hours_to_due, 0.0, URGENCY_WINDOW_HOURS)
}

impl<R, S, C, A> IntelligenceService<R, S, C, A>
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    /// Rank open tasks and deadlines due in the next seven days by
    /// urgency and deal impact, and append a `reminder_priority` snapshot.
    pub fn compute_reminder_priorities(
        &self,
        tenant: &TenantId,
        user: Option<&UserId>,
    ) -> Result<RankingSnapshot, IntelligenceError> {
        let now = Utc::now();
        let horizon = now + Duration::days(REMINDER_HORIZON_DAYS);

        let deals = self.crm.deals(tenant)?;
        let values = deal_value_lookup(&deals);

        let mut items: Vec<ReminderPriority> = Vec::new();

        for task in self.crm.open_tasks(tenant, user)? {
            let Some(due_at) = task.due_at else { continue };
            if due_at > horizon {
                continue;
            }
            let urgency = urgency(due_at, now);
            let impact = task
                .linked_deal
                .as_ref()
                .and_then(|deal| values.get(deal))
                .map(|value| normalize(*value, 0.0, IMPACT_CEILING))
                .unwrap_or(0.0);
            items.push(ReminderPriority {
                title: task.title.clone(),
                kind: ReminderKind::Task,
                due_at,
                urgency,
                impact,
                priority: urgency * 0.6 + impact * 0.4,
            });
        }

        for deadline in self.crm.deadlines_due_within(tenant, user, horizon)? {
            let urgency = urgency(deadline.due_at, now);
            let impact = deadline
                .linked_deal
                .as_ref()
                .and_then(|deal| values.get(deal))
                .map(|value| normalize(*value, 0.0, IMPACT_CEILING))
                .unwrap_or(0.0);
            items.push(ReminderPriority {
                title: deadline.title.clone(),
                kind: ReminderKind::Deadline,
                due_at: deadline.due_at,
                urgency,
                impact,
                priority: urgency * 0.7 + impact * 0.3,
            });
        }

        items.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.title.cmp(&b.title))
        });
        items.truncate(REMINDER_LIMIT);

        let item_count = items.len();
        let payload = json!({
            "scope_user": user.map(|user| user.0.clone()),
            "items": items,
        });

        let snapshot = RankingSnapshot {
            tenant: tenant.clone(),
            snapshot_date: now.date_naive(),
            kind: RankingKind::ReminderPriority,
            payload,
            created_at: now,
        };
        let stored = self.snapshots.append_ranking(snapshot)?;

        self.emit_audit(
            tenant,
            "reminder_priorities_ranked",
            "tenant",
            user.map(|user| user.0.clone()),
            json!({ "items": item_count }),
        );

        Ok(stored)
    }

    /// Rank every active user by 30-day revenue, pipeline, conversion,
    /// activity, and reschedule behavior, and append a
    /// `performance_ranking` snapshot.
    pub fn compute_performance_ranking(
        &self,
        tenant: &TenantId,
    ) -> Result<RankingSnapshot, IntelligenceError> {
        let now = Utc::now();
        let window_start = now - Duration::days(ACTIVITY_WINDOW_DAYS);

        let users = self.crm.active_users(tenant)?;
        let deals = self.crm.deals(tenant)?;
        let reschedules = self.crm.reschedule_requests_since(tenant, window_start)?;

        let mut entries: Vec<PerformanceEntry> = Vec::new();

        for user in &users {
            let Some(input) = self.crm.discipline_input(tenant, &user.id, window_start)? else {
                continue;
            };

            let lead_ids: Vec<&LeadId> =
                input.assigned_leads.iter().map(|lead| &lead.id).collect();
            let owns = |lead: &Option<LeadId>| {
                lead.as_ref()
                    .map(|lead| lead_ids.contains(&lead))
                    .unwrap_or(false)
            };

            let revenue: f64 = deals
                .iter()
                .filter(|deal| {
                    deal.status == DealStatus::Won
                        && owns(&deal.lead)
                        && deal.closed_at.map(|at| at >= window_start).unwrap_or(false)
                })
                .map(|deal| deal.value)
                .sum();

            let pipeline_value: f64 = deals
                .iter()
                .filter(|deal| deal.status == DealStatus::Open && owns(&deal.lead))
                .map(|deal| deal.value)
                .sum();

            let conversion_rate = if input.assigned_leads.is_empty() {
                0.0
            } else {
                input
                    .assigned_leads
                    .iter()
                    .filter(|lead| {
                        lead.converted_at.map(|at| at >= window_start).unwrap_or(false)
                    })
                    .count() as f64
                    / input.assigned_leads.len() as f64
            };

            let activity_count = (input.calls.len() + input.organized_meetings.len()) as u64;

            let reschedule_count = reschedules
                .iter()
                .filter(|request| request.user == user.id)
                .count();
            let reschedule_rate = if input.organized_meetings.is_empty() {
                0.0
            } else {
                (reschedule_count as f64 / input.organized_meetings.len() as f64).min(1.0)
            };

            entries.push(PerformanceEntry {
                user: user.id.clone(),
                name: user.name.clone(),
                score: 0.0,
                revenue,
                pipeline_value,
                conversion_rate,
                activity_count,
                reschedule_rate,
            });
        }

        // Normalize revenue/pipeline/activity against the cohort maximum so
        // the weighted composite compares peers, not absolute volumes.
        let max_revenue = entries.iter().map(|entry| entry.revenue).fold(0.0, f64::max);
        let max_pipeline = entries
            .iter()
            .map(|entry| entry.pipeline_value)
            .fold(0.0, f64::max);
        let max_activity = entries
            .iter()
            .map(|entry| entry.activity_count as f64)
            .fold(0.0, f64::max);

        for entry in entries.iter_mut() {
            let revenue_score = normalize(entry.revenue, 0.0, max_revenue);
            let pipeline_score = normalize(entry.pipeline_value, 0.0, max_pipeline);
            let conversion_score = entry.conversion_rate * 100.0;
            let activity_score = normalize(entry.activity_count as f64, 0.0, max_activity);
            let reliability_score = (1.0 - entry.reschedule_rate) * 100.0;

            entry.score = revenue_score * 0.35
                + pipeline_score * 0.20
                + conversion_score * 0.20
                + activity_score * 0.15
                + reliability_score * 0.10;
        }

        entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.user.0.cmp(&b.user.0))
        });

        let user_count = entries.len();
        let payload = json!({ "entries": entries });

        let snapshot = RankingSnapshot {
            tenant: tenant.clone(),
            snapshot_date: now.date_naive(),
            kind: RankingKind::PerformanceRanking,
            payload,
            created_at: now,
        };
        let stored = self.snapshots.append_ranking(snapshot)?;

        self.emit_audit(
            tenant,
            "performance_ranked",
            "tenant",
            None,
            json!({ "users": user_count }),
        );

        Ok(stored)
    }

    /// Build templated call scripts for a lead and append an `ai_scripts`
    /// snapshot. Text assembly only; no statistics involved.
    pub fn generate_scripts(
        &self,
        tenant: &TenantId,
        lead_id: &LeadId,
        stage: Option<DealStage>,
    ) -> Result<RankingSnapshot, IntelligenceError> {
        let now = Utc::now();
        let input = self
            .crm
            .lead_scoring_input(tenant, lead_id)?
            .ok_or_else(|| IntelligenceError::NotFound {
                entity: "lead",
                id: lead_id.0.clone(),
            })?;

        let lead = &input.lead;
        let budget_line = lead
            .budget
            .map(|budget| format!("a budget around {budget:.0}"))
            .unwrap_or_else(|| "an open budget".to_string());
        let property_line = lead
            .property_type
            .clone()
            .unwrap_or_else(|| "a property".to_string());
        let location_line = lead
            .location
            .clone()
            .unwrap_or_else(|| "your preferred area".to_string());

        let mut objections: Vec<String> = input
            .call_logs
            .iter()
            .rev()
            .filter_map(|call| call.objection.clone())
            .take(3)
            .collect();
        objections.dedup();

        let stage_line = match stage {
            Some(DealStage::Negotiation) | Some(DealStage::Contract) => {
                "Confirm the remaining paperwork and close the terms.".to_string()
            }
            Some(DealStage::Proposal) => {
                "Walk through the proposal highlights and schedule a decision call.".to_string()
            }
            Some(stage) => format!("Move the conversation toward the {} stage.", stage.label()),
            None => "Qualify interest and agree on a concrete next step.".to_string(),
        };

        let mut scripts = vec![
            json!({
                "title": "opening",
                "body": format!(
                    "Hi {}, following up on your interest in {} in {} with {}. {}",
                    lead.contact_name, property_line, location_line, budget_line, stage_line
                ),
            }),
            json!({
                "title": "value_pitch",
                "body": format!(
                    "We shortlisted {} options in {} matching {}. Can we book a viewing this week?",
                    property_line, location_line, budget_line
                ),
            }),
        ];

        if !objections.is_empty() {
            scripts.push(json!({
                "title": "objection_handling",
                "body": format!(
                    "Last time you mentioned: {}. Here is how we can address that together.",
                    objections.join("; ")
                ),
            }));
        }

        let script_count = scripts.len();
        let payload = json!({
            "lead": lead_id.0.clone(),
            "stage": stage.map(|stage| stage.label()),
            "scripts": scripts,
        });

        let snapshot = RankingSnapshot {
            tenant: tenant.clone(),
            snapshot_date: now.date_naive(),
            kind: RankingKind::AiScripts,
            payload,
            created_at: now,
        };
        let stored = self.snapshots.append_ranking(snapshot)?;

        self.emit_audit(
            tenant,
            "scripts_generated",
            "lead",
            Some(lead_id.0.clone()),
            json!({ "scripts": script_count }),
        );

        Ok(stored)
    }
}
