//! Append-only engine outputs.
//!
//! Snapshots are immutable once written; history accumulates by insertion,
//! never by update. Two computations racing for the same entity simply leave
//! two valid rows, and readers take the newest by `created_at`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{DealId, DealStage, LeadId, TenantId, UserId};
use super::numeric::{DisciplineFactors, LeadFactors, LeadTier};

/// Snapshot of a lead's composite score at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScoreSnapshot {
    pub tenant: TenantId,
    pub lead: LeadId,
    pub score: f64,
    pub tier: LeadTier,
    pub reasons: LeadScoreReasons,
    pub created_at: DateTime<Utc>,
}

/// Explanation payload embedded in every lead-score snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScoreReasons {
    pub factors: LeadFactors,
    pub tier: LeadTier,
    pub conversion_rate: f64,
    pub velocity_hours: Option<f64>,
}

/// Snapshot of a user's discipline index over the trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisciplineIndexSnapshot {
    pub tenant: TenantId,
    pub user: UserId,
    pub snapshot_date: NaiveDate,
    pub score: f64,
    pub factors: DisciplineFactors,
    pub created_at: DateTime<Utc>,
}

/// Deal-probability snapshot with confidence bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub tenant: TenantId,
    pub lead: Option<LeadId>,
    pub score: f64,
    pub factors: RiskFactors,
    pub created_at: DateTime<Utc>,
}

/// Factors payload of a [`RiskScore`].
///
/// `sample_size` exposes how many closed same-stage deals backed the Wilson
/// interval so readers can flag low-confidence bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub deal: DealId,
    pub stage: DealStage,
    pub probability: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
    pub sample_size: u64,
}

/// Discriminates the generic ranking snapshot payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingKind {
    RevenueForecast,
    ReminderPriority,
    PerformanceRanking,
    AiScripts,
}

impl RankingKind {
    pub const fn label(self) -> &'static str {
        match self {
            RankingKind::RevenueForecast => "revenue_forecast",
            RankingKind::ReminderPriority => "reminder_priority",
            RankingKind::PerformanceRanking => "performance_ranking",
            RankingKind::AiScripts => "ai_scripts",
        }
    }
}

/// Generic container for forecast, priority, performance, and script outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingSnapshot {
    pub tenant: TenantId,
    pub snapshot_date: NaiveDate,
    pub kind: RankingKind,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}
