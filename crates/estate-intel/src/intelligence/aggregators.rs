//! Factor aggregators: each turns raw tenant records into one normalized
//! `[0, 100]` sub-score. They are pure over their inputs; the orchestrator
//! supplies the clock so tests can pin time.

use chrono::{DateTime, Duration, Utc};

use super::config::{ClassificationTables, IntelligenceConfig, ScoringTargets};
use super::domain::{ActivityEvent, LeadRecord, LeadScoringInput, MeetingStatus, TaskStatus};
use super::numeric::{clamp, normalize, time_decay_weight};

/// Half-life applied to engagement events.
const ENGAGEMENT_HALF_LIFE_DAYS: f64 = 30.0;

/// Calls inside this window count toward the behavioral follow-up term.
const FOLLOW_UP_WINDOW_DAYS: i64 = 14;

/// Stage velocity slower than this earns no reward.
pub(crate) const VELOCITY_NEUTRAL_HOURS: f64 = 168.0;

fn matches_ignore_case(candidates: &[String], value: &str) -> bool {
    candidates
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(value))
}

fn best_tag_score(tags: &[String], table: &std::collections::BTreeMap<String, f64>) -> Option<f64> {
    tags.iter()
        .filter_map(|tag| {
            table
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(tag))
                .map(|(_, score)| *score)
        })
        .fold(None, |best, score| match best {
            Some(current) if current >= score => Some(current),
            _ => Some(score),
        })
}

/// Budget fit, property/location match bonuses, and the best company-size /
/// industry tag scores, weighted 35/20/15/15/15.
pub fn demographic_score(lead: &LeadRecord, tables: &ClassificationTables) -> f64 {
    let budget_score = normalize(lead.budget.unwrap_or(0.0), 100_000.0, 2_000_000.0);

    let property_score = match &lead.property_type {
        Some(kind) if matches_ignore_case(&tables.target_property_types, kind) => 90.0,
        _ => 60.0,
    };

    let location_score = match &lead.location {
        Some(location) if matches_ignore_case(&tables.target_locations, location) => 95.0,
        _ => 55.0,
    };

    let company_score = best_tag_score(&lead.tags, &tables.company_size_scores).unwrap_or(50.0);
    let industry_score = best_tag_score(&lead.tags, &tables.industry_scores).unwrap_or(55.0);

    clamp(
        budget_score * 0.35
            + property_score * 0.20
            + location_score * 0.15
            + company_score * 0.15
            + industry_score * 0.15,
    )
}

/// Decayed sum of weighted engagement events, normalized against the tenant
/// engagement target.
pub fn engagement_score(
    activities: &[ActivityEvent],
    config: &IntelligenceConfig,
    now: DateTime<Utc>,
) -> f64 {
    let decayed_sum: f64 = activities
        .iter()
        .map(|event| {
            let weight = config
                .engagement_weights
                .get(&event.event_type)
                .copied()
                .unwrap_or(0.0);
            let days_ago = (now - event.at).num_seconds() as f64 / 86_400.0;
            weight * time_decay_weight(days_ago, ENGAGEMENT_HALF_LIFE_DAYS)
        })
        .sum();

    normalize(decayed_sum, 0.0, config.targets.engagement_target)
}

/// Task completion, meeting completion, recent follow-up cadence, minus a
/// flat penalty per non-approved extension request.
pub fn behavioral_score(
    input: &LeadScoringInput,
    targets: &ScoringTargets,
    now: DateTime<Utc>,
) -> f64 {
    let total_tasks = input.tasks.len();
    let task_rate = if total_tasks == 0 {
        0.0
    } else {
        input
            .tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Completed)
            .count() as f64
            / total_tasks as f64
    };

    let total_meetings = input.meetings.len();
    let meeting_rate = if total_meetings == 0 {
        0.0
    } else {
        input
            .meetings
            .iter()
            .filter(|meeting| meeting.status == MeetingStatus::Completed)
            .count() as f64
            / total_meetings as f64
    };

    let window_start = now - Duration::days(FOLLOW_UP_WINDOW_DAYS);
    let recent_calls = input
        .call_logs
        .iter()
        .filter(|call| call.at >= window_start)
        .count() as f64;
    // Scaled to a 0-20 band so the three positive terms top out at 100.
    let follow_up = normalize(recent_calls, 0.0, targets.follow_up_target) * 0.2;

    let unapproved_extensions = input
        .extensions
        .iter()
        .filter(|extension| !extension.approved)
        .count() as f64;

    clamp(task_rate * 40.0 + meeting_rate * 40.0 + follow_up - unapproved_extensions * 4.0)
}

/// Cohort conversion rate blended with stage-transition velocity, 60/40.
///
/// Velocity is neutral (50) when fewer than two transitions exist; otherwise
/// faster-than-168h average transitions earn proportionally more.
pub fn historical_score(conversion_rate: f64, avg_velocity_hours: Option<f64>) -> f64 {
    let conversion_score = clamp(conversion_rate * 100.0);
    let velocity_score = match avg_velocity_hours {
        None => 50.0,
        Some(hours) => normalize(VELOCITY_NEUTRAL_HOURS - hours, 0.0, VELOCITY_NEUTRAL_HOURS),
    };

    clamp(conversion_score * 0.6 + velocity_score * 0.4)
}
