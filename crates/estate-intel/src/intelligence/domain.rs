//! Explicit value objects for the tenant-scoped CRM records the engine
//! reads. The original system handed loosely-typed ORM includes to the
//! scorers; here every aggregator consumes a concrete input struct built by
//! the repository boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

/// Identifier wrapper for a lead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

/// Identifier wrapper for a deal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DealId(pub String);

/// Identifier wrapper for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

/// Identifier wrapper for a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Pipeline stages a deal moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Prospecting,
    Qualification,
    Proposal,
    Negotiation,
    Contract,
    Won,
    Lost,
}

impl DealStage {
    pub const fn label(self) -> &'static str {
        match self {
            DealStage::Prospecting => "prospecting",
            DealStage::Qualification => "qualification",
            DealStage::Proposal => "proposal",
            DealStage::Negotiation => "negotiation",
            DealStage::Contract => "contract",
            DealStage::Won => "won",
            DealStage::Lost => "lost",
        }
    }
}

/// Lifecycle status of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Open,
    Won,
    Lost,
}

/// Completion status of a CRM task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Completed,
    Cancelled,
}

/// Status of a scheduled meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

/// A sales lead as the engine sees it: enough fields to score, nothing more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub id: LeadId,
    pub tenant: TenantId,
    pub source: String,
    pub contact_name: String,
    pub budget: Option<f64>,
    pub property_type: Option<String>,
    pub location: Option<String>,
    pub tags: Vec<String>,
    pub assigned_user: Option<UserId>,
    pub next_follow_up_at: Option<DateTime<Utc>>,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One recorded move between pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from_stage: DealStage,
    pub to_stage: DealStage,
    pub at: DateTime<Utc>,
}

/// A CRM task attached to a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub title: String,
    pub lead: Option<LeadId>,
    pub linked_deal: Option<DealId>,
    pub assignee: Option<UserId>,
    pub created_by: Option<UserId>,
    pub status: TaskStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A logged phone call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLog {
    pub lead: LeadId,
    pub user: Option<UserId>,
    pub at: DateTime<Utc>,
    pub objection: Option<String>,
}

/// A scheduled or held meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub lead: Option<LeadId>,
    pub organizer: Option<UserId>,
    pub status: MeetingStatus,
    pub scheduled_at: DateTime<Utc>,
}

/// An engagement/activity event on a lead or deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub lead: Option<LeadId>,
    pub event_type: String,
    pub tags: Vec<String>,
    pub at: DateTime<Utc>,
}

/// A request to extend a lead's follow-up window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionRequest {
    pub lead: LeadId,
    pub approved: bool,
    pub requested_at: DateTime<Utc>,
}

/// A contact attached to a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: String,
    pub role: Option<String>,
}

/// A deal in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealRecord {
    pub id: DealId,
    pub tenant: TenantId,
    pub lead: Option<LeadId>,
    pub stage: DealStage,
    pub status: DealStatus,
    pub value: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// A CRM user (agent or manager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub active: bool,
}

/// A standalone deadline, optionally linked to a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineRecord {
    pub title: String,
    pub linked_deal: Option<DealId>,
    pub assignee: Option<UserId>,
    pub due_at: DateTime<Utc>,
}

/// A meeting reschedule request, used for the reschedule-rate metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub user: UserId,
    pub requested_at: DateTime<Utc>,
}

/// Everything `score_lead` needs, assembled by the repository boundary in a
/// single fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScoringInput {
    pub lead: LeadRecord,
    pub tasks: Vec<TaskRecord>,
    pub call_logs: Vec<CallLog>,
    pub meetings: Vec<MeetingRecord>,
    pub stage_history: Vec<StageTransition>,
    pub activities: Vec<ActivityEvent>,
    pub extensions: Vec<ExtensionRequest>,
}

/// A user's trailing-window activity for the discipline index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisciplineInput {
    pub user: UserRecord,
    pub assigned_leads: Vec<LeadRecord>,
    pub calls: Vec<CallLog>,
    pub organized_meetings: Vec<MeetingRecord>,
    pub tasks: Vec<TaskRecord>,
    pub first_touch_hours: Vec<f64>,
}

/// A deal plus the relations the probability model consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealProbabilityInput {
    pub deal: DealRecord,
    pub contacts: Vec<ContactRecord>,
    pub meetings: Vec<MeetingRecord>,
    pub activities: Vec<ActivityEvent>,
    pub offers: u32,
}
