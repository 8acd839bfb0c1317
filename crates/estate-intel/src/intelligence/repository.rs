//! Collaborator contracts.
//!
//! The engine owns no persistence of its own: CRM records arrive through
//! [`CrmRepository`], outputs leave through the append-only
//! [`SnapshotRepository`], tenant overrides come from [`ModuleConfigStore`],
//! and audit/notification delivery happen behind fire-and-forget traits so
//! the engine can be exercised entirely in memory.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{
    ActivityEvent, DealId, DealProbabilityInput, DealRecord, DeadlineRecord, DisciplineInput,
    LeadId, LeadRecord, LeadScoringInput, RescheduleRequest, TaskRecord, TenantId, UserId,
    UserRecord,
};
use super::snapshot::{DisciplineIndexSnapshot, LeadScoreSnapshot, RankingSnapshot, RiskScore};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Tenant-scoped read access to CRM records, plus the single non-snapshot
/// write the engine owns: appending engagement events.
pub trait CrmRepository: Send + Sync {
    /// Load a lead with every relation the scorer consumes, or `None` when
    /// the lead does not exist in the tenant.
    fn lead_scoring_input(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<Option<LeadScoringInput>, RepositoryError>;

    /// Leads sharing a source created since `since`, for cohort conversion
    /// statistics.
    fn leads_by_source_since(
        &self,
        tenant: &TenantId,
        source: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LeadRecord>, RepositoryError>;

    /// Leads assigned to anyone, used by the reminder sweep.
    fn leads(&self, tenant: &TenantId) -> Result<Vec<LeadRecord>, RepositoryError>;

    /// Load a deal with contacts/meetings/activities/offers, or `None`.
    fn deal_probability_input(
        &self,
        tenant: &TenantId,
        deal: &DealId,
    ) -> Result<Option<DealProbabilityInput>, RepositoryError>;

    /// Every deal in the tenant (open and closed).
    fn deals(&self, tenant: &TenantId) -> Result<Vec<DealRecord>, RepositoryError>;

    /// A user's trailing-window activity bundle, or `None` when the user
    /// does not exist in the tenant.
    fn discipline_input(
        &self,
        tenant: &TenantId,
        user: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Option<DisciplineInput>, RepositoryError>;

    fn active_users(&self, tenant: &TenantId) -> Result<Vec<UserRecord>, RepositoryError>;

    /// Open tasks, optionally scoped to one assignee.
    fn open_tasks(
        &self,
        tenant: &TenantId,
        assignee: Option<&UserId>,
    ) -> Result<Vec<TaskRecord>, RepositoryError>;

    /// Deadlines due on or before `until`, optionally scoped to an assignee.
    fn deadlines_due_within(
        &self,
        tenant: &TenantId,
        assignee: Option<&UserId>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DeadlineRecord>, RepositoryError>;

    fn reschedule_requests_since(
        &self,
        tenant: &TenantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<RescheduleRequest>, RepositoryError>;

    /// Append one engagement activity. The engine never mutates or deletes
    /// CRM records beyond this.
    fn append_engagement(
        &self,
        tenant: &TenantId,
        event: ActivityEvent,
    ) -> Result<(), RepositoryError>;
}

/// Append-only sink for engine outputs. Implementations must never update
/// or delete previously written snapshots.
pub trait SnapshotRepository: Send + Sync {
    fn append_lead_score(
        &self,
        snapshot: LeadScoreSnapshot,
    ) -> Result<LeadScoreSnapshot, RepositoryError>;

    fn append_discipline_index(
        &self,
        snapshot: DisciplineIndexSnapshot,
    ) -> Result<DisciplineIndexSnapshot, RepositoryError>;

    fn append_risk_score(&self, snapshot: RiskScore) -> Result<RiskScore, RepositoryError>;

    fn append_ranking(
        &self,
        snapshot: RankingSnapshot,
    ) -> Result<RankingSnapshot, RepositoryError>;
}

/// Per-tenant module configuration blobs.
pub trait ModuleConfigStore: Send + Sync {
    fn get_config(
        &self,
        tenant: &TenantId,
        module_key: &str,
    ) -> Result<Option<Value>, RepositoryError>;
}

/// Timing/audit entry emitted after each computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub tenant: TenantId,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub metadata: Value,
}

/// Audit dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget audit/timing sink. The engine logs and ignores failures.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Notification categories the reminder sweep emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Reminder,
    Warning,
}

impl NotificationKind {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationKind::Reminder => "reminder",
            NotificationKind::Warning => "warning",
        }
    }
}

/// Outbound notification payload; transport is the collaborator's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub tenant: TenantId,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub dedup_key: String,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Delivery collaborator for the reminder sweep. `recently_sent` answers the
/// dedup-window question so a burst of sweeps sends each notification once.
pub trait NotificationSender: Send + Sync {
    fn send(&self, notification: NotificationRequest) -> Result<(), NotificationError>;

    fn recently_sent(
        &self,
        tenant: &TenantId,
        dedup_key: &str,
        within: Duration,
    ) -> Result<bool, NotificationError>;
}
