//! Shared in-memory fakes and record builders for the intelligence
//! scenario tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::intelligence::domain::{
    ActivityEvent, CallLog, DeadlineRecord, DealId, DealProbabilityInput, DealRecord, DealStage,
    DealStatus, DisciplineInput, ExtensionRequest, LeadId, LeadRecord, LeadScoringInput,
    MeetingRecord, MeetingStatus, RescheduleRequest, TaskId, TaskRecord, TaskStatus, TenantId,
    UserId,
    UserRecord,
};
use crate::intelligence::repository::{
    AuditEntry, AuditError, AuditSink, CrmRepository, ModuleConfigStore, NotificationError,
    NotificationRequest, NotificationSender, RepositoryError, SnapshotRepository,
};
use crate::intelligence::scoring::IntelligenceService;
use crate::intelligence::snapshot::{
    DisciplineIndexSnapshot, LeadScoreSnapshot, RankingSnapshot, RiskScore,
};

pub(super) const TENANT: &str = "acme-estates";

pub(super) fn tenant() -> TenantId {
    TenantId(TENANT.to_string())
}

#[derive(Default)]
pub(super) struct InMemoryCrm {
    pub lead_inputs: Mutex<HashMap<String, LeadScoringInput>>,
    pub lead_index: Mutex<Vec<LeadRecord>>,
    pub deal_inputs: Mutex<HashMap<String, DealProbabilityInput>>,
    pub deal_index: Mutex<Vec<DealRecord>>,
    pub discipline_inputs: Mutex<HashMap<String, DisciplineInput>>,
    pub users: Mutex<Vec<UserRecord>>,
    pub tasks: Mutex<Vec<TaskRecord>>,
    pub deadlines: Mutex<Vec<DeadlineRecord>>,
    pub reschedules: Mutex<Vec<RescheduleRequest>>,
    pub engagements: Mutex<Vec<ActivityEvent>>,
}

impl InMemoryCrm {
    pub fn insert_lead(&self, input: LeadScoringInput) {
        self.lead_index
            .lock()
            .expect("lead index mutex poisoned")
            .push(input.lead.clone());
        self.lead_inputs
            .lock()
            .expect("lead input mutex poisoned")
            .insert(input.lead.id.0.clone(), input);
    }

    pub fn insert_deal(&self, input: DealProbabilityInput) {
        self.deal_index
            .lock()
            .expect("deal index mutex poisoned")
            .push(input.deal.clone());
        self.deal_inputs
            .lock()
            .expect("deal input mutex poisoned")
            .insert(input.deal.id.0.clone(), input);
    }

    pub fn insert_closed_deal(&self, deal: DealRecord) {
        self.deal_index
            .lock()
            .expect("deal index mutex poisoned")
            .push(deal);
    }

    pub fn insert_user(&self, user: UserRecord, input: DisciplineInput) {
        self.users
            .lock()
            .expect("user mutex poisoned")
            .push(user.clone());
        self.discipline_inputs
            .lock()
            .expect("discipline mutex poisoned")
            .insert(user.id.0, input);
    }
}

impl CrmRepository for InMemoryCrm {
    fn lead_scoring_input(
        &self,
        _tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<Option<LeadScoringInput>, RepositoryError> {
        Ok(self
            .lead_inputs
            .lock()
            .expect("lead input mutex poisoned")
            .get(&lead.0)
            .cloned())
    }

    fn leads_by_source_since(
        &self,
        _tenant: &TenantId,
        source: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LeadRecord>, RepositoryError> {
        Ok(self
            .lead_index
            .lock()
            .expect("lead index mutex poisoned")
            .iter()
            .filter(|lead| lead.source == source && lead.created_at >= since)
            .cloned()
            .collect())
    }

    fn leads(&self, _tenant: &TenantId) -> Result<Vec<LeadRecord>, RepositoryError> {
        Ok(self
            .lead_index
            .lock()
            .expect("lead index mutex poisoned")
            .clone())
    }

    fn deal_probability_input(
        &self,
        _tenant: &TenantId,
        deal: &DealId,
    ) -> Result<Option<DealProbabilityInput>, RepositoryError> {
        Ok(self
            .deal_inputs
            .lock()
            .expect("deal input mutex poisoned")
            .get(&deal.0)
            .cloned())
    }

    fn deals(&self, _tenant: &TenantId) -> Result<Vec<DealRecord>, RepositoryError> {
        Ok(self
            .deal_index
            .lock()
            .expect("deal index mutex poisoned")
            .clone())
    }

    fn discipline_input(
        &self,
        _tenant: &TenantId,
        user: &UserId,
        _since: DateTime<Utc>,
    ) -> Result<Option<DisciplineInput>, RepositoryError> {
        Ok(self
            .discipline_inputs
            .lock()
            .expect("discipline mutex poisoned")
            .get(&user.0)
            .cloned())
    }

    fn active_users(&self, _tenant: &TenantId) -> Result<Vec<UserRecord>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .expect("user mutex poisoned")
            .iter()
            .filter(|user| user.active)
            .cloned()
            .collect())
    }

    fn open_tasks(
        &self,
        _tenant: &TenantId,
        assignee: Option<&UserId>,
    ) -> Result<Vec<TaskRecord>, RepositoryError> {
        Ok(self
            .tasks
            .lock()
            .expect("task mutex poisoned")
            .iter()
            .filter(|task| task.status == TaskStatus::Open)
            .filter(|task| match assignee {
                Some(user) => task.assignee.as_ref() == Some(user),
                None => true,
            })
            .cloned()
            .collect())
    }

    fn deadlines_due_within(
        &self,
        _tenant: &TenantId,
        assignee: Option<&UserId>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DeadlineRecord>, RepositoryError> {
        Ok(self
            .deadlines
            .lock()
            .expect("deadline mutex poisoned")
            .iter()
            .filter(|deadline| deadline.due_at <= until)
            .filter(|deadline| match assignee {
                Some(user) => deadline.assignee.as_ref() == Some(user),
                None => true,
            })
            .cloned()
            .collect())
    }

    fn reschedule_requests_since(
        &self,
        _tenant: &TenantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<RescheduleRequest>, RepositoryError> {
        Ok(self
            .reschedules
            .lock()
            .expect("reschedule mutex poisoned")
            .iter()
            .filter(|request| request.requested_at >= since)
            .cloned()
            .collect())
    }

    fn append_engagement(
        &self,
        _tenant: &TenantId,
        event: ActivityEvent,
    ) -> Result<(), RepositoryError> {
        self.engagements
            .lock()
            .expect("engagement mutex poisoned")
            .push(event);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct InMemorySnapshots {
    pub lead_scores: Mutex<Vec<LeadScoreSnapshot>>,
    pub discipline_indexes: Mutex<Vec<DisciplineIndexSnapshot>>,
    pub risk_scores: Mutex<Vec<RiskScore>>,
    pub rankings: Mutex<Vec<RankingSnapshot>>,
}

impl InMemorySnapshots {
    pub fn lead_scores(&self) -> Vec<LeadScoreSnapshot> {
        self.lead_scores
            .lock()
            .expect("lead score mutex poisoned")
            .clone()
    }

    pub fn rankings(&self) -> Vec<RankingSnapshot> {
        self.rankings.lock().expect("ranking mutex poisoned").clone()
    }

    pub fn risk_scores(&self) -> Vec<RiskScore> {
        self.risk_scores
            .lock()
            .expect("risk score mutex poisoned")
            .clone()
    }

    pub fn discipline_indexes(&self) -> Vec<DisciplineIndexSnapshot> {
        self.discipline_indexes
            .lock()
            .expect("discipline mutex poisoned")
            .clone()
    }
}

impl SnapshotRepository for InMemorySnapshots {
    fn append_lead_score(
        &self,
        snapshot: LeadScoreSnapshot,
    ) -> Result<LeadScoreSnapshot, RepositoryError> {
        self.lead_scores
            .lock()
            .expect("lead score mutex poisoned")
            .push(snapshot.clone());
        Ok(snapshot)
    }

    fn append_discipline_index(
        &self,
        snapshot: DisciplineIndexSnapshot,
    ) -> Result<DisciplineIndexSnapshot, RepositoryError> {
        self.discipline_indexes
            .lock()
            .expect("discipline mutex poisoned")
            .push(snapshot.clone());
        Ok(snapshot)
    }

    fn append_risk_score(&self, snapshot: RiskScore) -> Result<RiskScore, RepositoryError> {
        self.risk_scores
            .lock()
            .expect("risk score mutex poisoned")
            .push(snapshot.clone());
        Ok(snapshot)
    }

    fn append_ranking(
        &self,
        snapshot: RankingSnapshot,
    ) -> Result<RankingSnapshot, RepositoryError> {
        self.rankings
            .lock()
            .expect("ranking mutex poisoned")
            .push(snapshot.clone());
        Ok(snapshot)
    }
}

#[derive(Default)]
pub(super) struct InMemoryConfigStore {
    pub blobs: Mutex<HashMap<String, Value>>,
}

impl InMemoryConfigStore {
    pub fn set(&self, tenant: &TenantId, blob: Value) {
        self.blobs
            .lock()
            .expect("config mutex poisoned")
            .insert(tenant.0.clone(), blob);
    }
}

impl ModuleConfigStore for InMemoryConfigStore {
    fn get_config(
        &self,
        tenant: &TenantId,
        _module_key: &str,
    ) -> Result<Option<Value>, RepositoryError> {
        Ok(self
            .blobs
            .lock()
            .expect("config mutex poisoned")
            .get(&tenant.0)
            .cloned())
    }
}

#[derive(Default)]
pub(super) struct RecordingAudit {
    pub entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAudit {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    pub sent: Mutex<Vec<(NotificationRequest, DateTime<Utc>)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .iter()
            .map(|(notification, _)| notification.clone())
            .collect()
    }
}

impl NotificationSender for RecordingNotifier {
    fn send(&self, notification: NotificationRequest) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push((notification, Utc::now()));
        Ok(())
    }

    fn recently_sent(
        &self,
        _tenant: &TenantId,
        dedup_key: &str,
        within: Duration,
    ) -> Result<bool, NotificationError> {
        let cutoff = Utc::now() - within;
        Ok(self
            .sent
            .lock()
            .expect("notifier mutex poisoned")
            .iter()
            .any(|(notification, at)| notification.dedup_key == dedup_key && *at >= cutoff))
    }
}

pub(super) type TestService =
    IntelligenceService<InMemoryCrm, InMemorySnapshots, InMemoryConfigStore, RecordingAudit>;

pub(super) struct Harness {
    pub service: Arc<TestService>,
    pub crm: Arc<InMemoryCrm>,
    pub snapshots: Arc<InMemorySnapshots>,
    pub config: Arc<InMemoryConfigStore>,
    pub audit: Arc<RecordingAudit>,
}

pub(super) fn harness() -> Harness {
    let crm = Arc::new(InMemoryCrm::default());
    let snapshots = Arc::new(InMemorySnapshots::default());
    let config = Arc::new(InMemoryConfigStore::default());
    let audit = Arc::new(RecordingAudit::default());
    let service = Arc::new(IntelligenceService::new(
        Arc::clone(&crm),
        Arc::clone(&snapshots),
        Arc::clone(&config),
        Arc::clone(&audit),
    ));

    Harness {
        service,
        crm,
        snapshots,
        config,
        audit,
    }
}

pub(super) fn lead_record(id: &str, source: &str, created_days_ago: i64) -> LeadRecord {
    let now = Utc::now();
    LeadRecord {
        id: LeadId(id.to_string()),
        tenant: tenant(),
        source: source.to_string(),
        contact_name: format!("contact-{id}"),
        budget: Some(900_000.0),
        property_type: Some("villa".to_string()),
        location: Some("downtown".to_string()),
        tags: vec!["enterprise".to_string()],
        assigned_user: None,
        next_follow_up_at: None,
        converted_at: None,
        created_at: now - Duration::days(created_days_ago),
        updated_at: now - Duration::days(1),
    }
}

pub(super) fn scoring_input(lead: LeadRecord) -> LeadScoringInput {
    let now = Utc::now();
    let lead_id = lead.id.clone();
    LeadScoringInput {
        lead,
        tasks: vec![
            TaskRecord {
                id: TaskId("task-brochure".to_string()),
                title: "send brochure".to_string(),
                lead: Some(lead_id.clone()),
                linked_deal: None,
                assignee: None,
                created_by: None,
                status: TaskStatus::Completed,
                due_at: Some(now - Duration::days(3)),
                completed_at: Some(now - Duration::days(3)),
                created_at: now - Duration::days(5),
            },
            TaskRecord {
                id: TaskId("task-visit".to_string()),
                title: "site visit".to_string(),
                lead: Some(lead_id.clone()),
                linked_deal: None,
                assignee: None,
                created_by: None,
                status: TaskStatus::Open,
                due_at: Some(now + Duration::days(2)),
                completed_at: None,
                created_at: now - Duration::days(2),
            },
        ],
        call_logs: vec![CallLog {
            lead: lead_id.clone(),
            user: None,
            at: now - Duration::days(2),
            objection: Some("price too high".to_string()),
        }],
        meetings: vec![MeetingRecord {
            lead: Some(lead_id.clone()),
            organizer: None,
            status: MeetingStatus::Completed,
            scheduled_at: now - Duration::days(4),
        }],
        stage_history: vec![
            StageTransitionFixture::at(now - Duration::days(10)),
            StageTransitionFixture::at(now - Duration::days(6)),
        ],
        activities: vec![ActivityEvent {
            lead: Some(lead_id.clone()),
            event_type: "site_visit".to_string(),
            tags: vec![],
            at: now - Duration::days(1),
        }],
        extensions: vec![ExtensionRequest {
            lead: lead_id,
            approved: true,
            requested_at: now - Duration::days(1),
        }],
    }
}

pub(super) struct StageTransitionFixture;

impl StageTransitionFixture {
    pub fn at(at: DateTime<Utc>) -> crate::intelligence::domain::StageTransition {
        crate::intelligence::domain::StageTransition {
            from_stage: DealStage::Prospecting,
            to_stage: DealStage::Qualification,
            at,
        }
    }
}

pub(super) fn deal_record(
    id: &str,
    stage: DealStage,
    status: DealStatus,
    value: f64,
    opened_days_ago: i64,
    closed_days_ago: Option<i64>,
) -> DealRecord {
    let now = Utc::now();
    DealRecord {
        id: DealId(id.to_string()),
        tenant: tenant(),
        lead: Some(LeadId(format!("lead-{id}"))),
        stage,
        status,
        value,
        opened_at: now - Duration::days(opened_days_ago),
        closed_at: closed_days_ago.map(|days| now - Duration::days(days)),
    }
}
