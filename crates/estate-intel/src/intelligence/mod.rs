//! Intelligence scoring & forecasting engine.
//!
//! Leaves first: pure numeric primitives, then the tenant configuration
//! resolver, the factor aggregators, and on top of those the orchestrator,
//! forecast builder, ranking builders, reminder sweep, and the trigger
//! dispatcher that keeps everything eventually consistent.

pub mod aggregators;
pub mod config;
pub mod domain;
pub mod forecast;
pub mod numeric;
pub mod ranking;
pub mod reminders;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod snapshot;
pub mod triggers;

#[cfg(test)]
mod tests;

pub use config::{resolve_config, IntelligenceConfig, IntelligenceOverrides, MODULE_KEY};
pub use domain::{
    ActivityEvent, CallLog, ContactRecord, DeadlineRecord, DealId, DealProbabilityInput,
    DealRecord, DealStage, DealStatus, DisciplineInput, ExtensionRequest, LeadId, LeadRecord,
    LeadScoringInput, MeetingRecord, MeetingStatus, RescheduleRequest, StageTransition,
    TaskId, TaskRecord, TaskStatus, TenantId, UserId, UserRecord,
};
pub use numeric::{
    DisciplineFactors, DisciplineWeights, LeadFactors, LeadScoreWeights, LeadTier, WilsonInterval,
};
pub use ranking::{PerformanceEntry, ReminderKind, ReminderPriority};
pub use reminders::{ReminderEngine, SweepSummary, REMINDER_MARKER, WARNING_MARKER};
pub use repository::{
    AuditEntry, AuditError, AuditSink, CrmRepository, ModuleConfigStore, NotificationError,
    NotificationKind, NotificationRequest, NotificationSender, RepositoryError,
    SnapshotRepository,
};
pub use router::{intelligence_router, IntelligenceState};
pub use scoring::{DealProbabilityOutcome, IntelligenceError, IntelligenceService};
pub use snapshot::{
    DisciplineIndexSnapshot, LeadScoreReasons, LeadScoreSnapshot, RankingKind, RankingSnapshot,
    RiskFactors, RiskScore,
};
pub use triggers::{IntelligenceTrigger, TriggerDispatcher, TriggerKind};
