//! In-process implementations of the engine collaborator traits, plus the
//! seeded demo dataset. A deployment backed by a real CRM database swaps
//! these for its own adapters; the engine only sees the traits.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use estate_intel::intelligence::{
    ActivityEvent, AuditEntry, AuditError, AuditSink, CallLog, CrmRepository, DeadlineRecord,
    DealId, DealProbabilityInput, DealRecord, DealStage, DealStatus, DisciplineIndexSnapshot,
    DisciplineInput, LeadId, LeadRecord, LeadScoreSnapshot, LeadScoringInput, MeetingRecord,
    MeetingStatus, ModuleConfigStore, NotificationError, NotificationRequest, NotificationSender,
    RankingSnapshot, RepositoryError, RescheduleRequest, RiskScore, SnapshotRepository,
    TaskId, TaskRecord, TaskStatus, TenantId, UserId, UserRecord,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory CRM backing store keyed by entity id. Tenant scoping is
/// structural here: one store instance serves one logical database.
#[derive(Default)]
pub(crate) struct InMemoryCrmStore {
    lead_inputs: Mutex<HashMap<String, LeadScoringInput>>,
    lead_index: Mutex<Vec<LeadRecord>>,
    deal_inputs: Mutex<HashMap<String, DealProbabilityInput>>,
    deal_index: Mutex<Vec<DealRecord>>,
    discipline_inputs: Mutex<HashMap<String, DisciplineInput>>,
    users: Mutex<Vec<UserRecord>>,
    tasks: Mutex<Vec<TaskRecord>>,
    deadlines: Mutex<Vec<DeadlineRecord>>,
    reschedules: Mutex<Vec<RescheduleRequest>>,
}

impl InMemoryCrmStore {
    pub(crate) fn insert_lead_bundle(&self, input: LeadScoringInput) {
        self.lead_index
            .lock()
            .expect("lead index mutex poisoned")
            .push(input.lead.clone());
        self.lead_inputs
            .lock()
            .expect("lead input mutex poisoned")
            .insert(input.lead.id.0.clone(), input);
    }

    pub(crate) fn insert_deal_bundle(&self, input: DealProbabilityInput) {
        self.deal_index
            .lock()
            .expect("deal index mutex poisoned")
            .push(input.deal.clone());
        self.deal_inputs
            .lock()
            .expect("deal input mutex poisoned")
            .insert(input.deal.id.0.clone(), input);
    }

    pub(crate) fn insert_closed_deal(&self, deal: DealRecord) {
        self.deal_index
            .lock()
            .expect("deal index mutex poisoned")
            .push(deal);
    }

    pub(crate) fn insert_user(&self, user: UserRecord, input: DisciplineInput) {
        self.users
            .lock()
            .expect("user mutex poisoned")
            .push(user.clone());
        self.discipline_inputs
            .lock()
            .expect("discipline mutex poisoned")
            .insert(user.id.0, input);
    }

    pub(crate) fn push_task(&self, task: TaskRecord) {
        self.tasks.lock().expect("task mutex poisoned").push(task);
    }

    pub(crate) fn push_deadline(&self, deadline: DeadlineRecord) {
        self.deadlines
            .lock()
            .expect("deadline mutex poisoned")
            .push(deadline);
    }

    pub(crate) fn lead_ids(&self) -> Vec<LeadId> {
        self.lead_index
            .lock()
            .expect("lead index mutex poisoned")
            .iter()
            .map(|lead| lead.id.clone())
            .collect()
    }

    pub(crate) fn open_deal_ids(&self) -> Vec<DealId> {
        self.deal_inputs
            .lock()
            .expect("deal input mutex poisoned")
            .values()
            .filter(|input| input.deal.status == DealStatus::Open)
            .map(|input| input.deal.id.clone())
            .collect()
    }

    pub(crate) fn user_ids(&self) -> Vec<UserId> {
        self.users
            .lock()
            .expect("user mutex poisoned")
            .iter()
            .map(|user| user.id.clone())
            .collect()
    }
}

impl CrmRepository for InMemoryCrmStore {
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
        if let Some(lead) = &event.lead {
            let mut inputs = self.lead_inputs.lock().expect("lead input mutex poisoned");
            if let Some(input) = inputs.get_mut(&lead.0) {
                input.activities.push(event);
                return Ok(());
            }
        }
        Err(RepositoryError::NotFound)
    }
}

/// Append-only snapshot store. Rows are only ever pushed.
#[derive(Default)]
pub(crate) struct InMemorySnapshotStore {
    lead_scores: Mutex<Vec<LeadScoreSnapshot>>,
    discipline_indexes: Mutex<Vec<DisciplineIndexSnapshot>>,
    risk_scores: Mutex<Vec<RiskScore>>,
    rankings: Mutex<Vec<RankingSnapshot>>,
}

impl SnapshotRepository for InMemorySnapshotStore {
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

/// Per-tenant module configuration blobs held in memory.
#[derive(Default)]
pub(crate) struct InMemoryModuleConfig {
    blobs: Mutex<HashMap<String, serde_json::Value>>,
}

impl ModuleConfigStore for InMemoryModuleConfig {
    fn get_config(
        &self,
        tenant: &TenantId,
        _module_key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        Ok(self
            .blobs
            .lock()
            .expect("config mutex poisoned")
            .get(&tenant.0)
            .cloned())
    }
}

/// Audit sink that forwards every entry to the tracing pipeline.
#[derive(Default)]
pub(crate) struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        info!(
            tenant = %entry.tenant.0,
            action = %entry.action,
            entity = %entry.entity_type,
            entity_id = entry.entity_id.as_deref().unwrap_or("-"),
            metadata = %entry.metadata,
            "audit"
        );
        Ok(())
    }
}

/// Notification sender that writes to stdout and remembers what it sent so
/// the sweep's dedup window works across repeated runs in one process.
#[derive(Default)]
pub(crate) struct ConsoleNotificationSender {
    sent: Mutex<Vec<(NotificationRequest, DateTime<Utc>)>>,
}

impl NotificationSender for ConsoleNotificationSender {
    fn send(&self, notification: NotificationRequest) -> Result<(), NotificationError> {
        println!(
            "[{}] -> {}: {} | {}",
            notification.kind.label(),
            notification.recipient.0,
            notification.title,
            notification.body
        );
        self.sent
            .lock()
            .expect("notification mutex poisoned")
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
            .expect("notification mutex poisoned")
            .iter()
            .any(|(notification, at)| notification.dedup_key == dedup_key && *at >= cutoff))
    }
}

/// Populate a CRM store with a small but representative tenant dataset:
/// three leads at different heat levels, a closed-deal history, two open
/// deals, two agents, and a handful of tasks and deadlines.
pub(crate) fn seed_demo_data(crm: &InMemoryCrmStore, tenant: &TenantId) {
    let now = Utc::now();
    let agent_a = UserId("agent-amira".to_string());
    let agent_b = UserId("agent-bassem".to_string());

    let hot_lead = LeadRecord {
        id: LeadId("lead-hot".to_string()),
        tenant: tenant.clone(),
        source: "facebook".to_string(),
        contact_name: "Laila Mostafa".to_string(),
        budget: Some(1_500_000.0),
        property_type: Some("villa".to_string()),
        location: Some("sheikh_zayed".to_string()),
        tags: vec!["finance".to_string()],
        assigned_user: Some(agent_a.clone()),
        next_follow_up_at: Some(now + Duration::minutes(45)),
        converted_at: None,
        created_at: now - Duration::days(9),
        updated_at: now - Duration::days(1),
    };
    crm.insert_lead_bundle(LeadScoringInput {
        tasks: vec![
            TaskRecord {
                id: TaskId("task-shortlist".to_string()),
                title: "send shortlist".to_string(),
                lead: Some(hot_lead.id.clone()),
                linked_deal: None,
                assignee: Some(agent_a.clone()),
                created_by: Some(agent_b.clone()),
                status: TaskStatus::Completed,
                due_at: Some(now - Duration::days(4)),
                completed_at: Some(now - Duration::days(4)),
                created_at: now - Duration::days(6),
            },
            TaskRecord {
                id: TaskId("task-site-visit".to_string()),
                title: "book site visit".to_string(),
                lead: Some(hot_lead.id.clone()),
                linked_deal: None,
                assignee: Some(agent_a.clone()),
                created_by: Some(agent_b.clone()),
                status: TaskStatus::Completed,
                due_at: Some(now - Duration::days(2)),
                completed_at: Some(now - Duration::days(2)),
                created_at: now - Duration::days(3),
            },
        ],
        call_logs: vec![
            CallLog {
                lead: hot_lead.id.clone(),
                user: Some(agent_a.clone()),
                at: now - Duration::days(5),
                objection: None,
            },
            CallLog {
                lead: hot_lead.id.clone(),
                user: Some(agent_a.clone()),
                at: now - Duration::days(1),
                objection: Some("worried about payment plan".to_string()),
            },
        ],
        meetings: vec![MeetingRecord {
            lead: Some(hot_lead.id.clone()),
            organizer: Some(agent_a.clone()),
            status: MeetingStatus::Completed,
            scheduled_at: now - Duration::days(2),
        }],
        stage_history: vec![],
        activities: vec![
            ActivityEvent {
                lead: Some(hot_lead.id.clone()),
                event_type: "site_visit".to_string(),
                tags: vec![],
                at: now - Duration::days(2),
            },
            ActivityEvent {
                lead: Some(hot_lead.id.clone()),
                event_type: "whatsapp_reply".to_string(),
                tags: vec![],
                at: now - Duration::days(1),
            },
        ],
        extensions: vec![],
        lead: hot_lead,
    });

    let warm_lead = LeadRecord {
        id: LeadId("lead-warm".to_string()),
        tenant: tenant.clone(),
        source: "facebook".to_string(),
        contact_name: "Omar Fathy".to_string(),
        budget: Some(800_000.0),
        property_type: Some("apartment".to_string()),
        location: Some("new_cairo".to_string()),
        tags: vec![],
        assigned_user: Some(agent_b.clone()),
        next_follow_up_at: Some(now + Duration::days(2)),
        converted_at: None,
        created_at: now - Duration::days(20),
        updated_at: now - Duration::days(3),
    };
    crm.insert_lead_bundle(LeadScoringInput {
        tasks: vec![TaskRecord {
            id: TaskId("task-brochure".to_string()),
            title: "share brochure".to_string(),
            lead: Some(warm_lead.id.clone()),
            linked_deal: None,
            assignee: Some(agent_b.clone()),
            created_by: Some(agent_a.clone()),
            status: TaskStatus::Open,
            due_at: Some(now + Duration::days(1)),
            completed_at: None,
            created_at: now - Duration::days(2),
        }],
        call_logs: vec![CallLog {
            lead: warm_lead.id.clone(),
            user: Some(agent_b.clone()),
            at: now - Duration::days(6),
            objection: Some("price too high".to_string()),
        }],
        meetings: vec![],
        stage_history: vec![],
        activities: vec![ActivityEvent {
            lead: Some(warm_lead.id.clone()),
            event_type: "property_view".to_string(),
            tags: vec![],
            at: now - Duration::days(4),
        }],
        extensions: vec![],
        lead: warm_lead,
    });

    let cold_lead = LeadRecord {
        id: LeadId("lead-cold".to_string()),
        tenant: tenant.clone(),
        source: "walk_in".to_string(),
        contact_name: "Hany Ezz".to_string(),
        budget: None,
        property_type: None,
        location: None,
        tags: vec![],
        assigned_user: Some(agent_b.clone()),
        next_follow_up_at: None,
        converted_at: None,
        created_at: now - Duration::days(40),
        updated_at: now - Duration::days(25),
    };
    crm.insert_lead_bundle(LeadScoringInput {
        tasks: vec![],
        call_logs: vec![],
        meetings: vec![],
        stage_history: vec![],
        activities: vec![],
        extensions: vec![],
        lead: cold_lead,
    });

    // Closed history backing cohort statistics and the forecast.
    for (id, stage, status, value, opened, closed) in [
        ("deal-h1", DealStage::Negotiation, DealStatus::Won, 1_200_000.0, 140, 80),
        ("deal-h2", DealStage::Negotiation, DealStatus::Won, 950_000.0, 120, 60),
        ("deal-h3", DealStage::Negotiation, DealStatus::Lost, 700_000.0, 110, 70),
        ("deal-h4", DealStage::Proposal, DealStatus::Won, 650_000.0, 100, 45),
        ("deal-h5", DealStage::Proposal, DealStatus::Lost, 500_000.0, 90, 50),
    ] {
        crm.insert_closed_deal(DealRecord {
            id: DealId(id.to_string()),
            tenant: tenant.clone(),
            lead: Some(LeadId("lead-hot".to_string())),
            stage,
            status,
            value,
            opened_at: now - Duration::days(opened),
            closed_at: Some(now - Duration::days(closed)),
        });
    }

    crm.insert_deal_bundle(DealProbabilityInput {
        deal: DealRecord {
            id: DealId("deal-open-1".to_string()),
            tenant: tenant.clone(),
            lead: Some(LeadId("lead-hot".to_string())),
            stage: DealStage::Negotiation,
            status: DealStatus::Open,
            value: 1_400_000.0,
            opened_at: now - Duration::days(25),
            closed_at: None,
        },
        contacts: vec![],
        meetings: vec![MeetingRecord {
            lead: Some(LeadId("lead-hot".to_string())),
            organizer: Some(agent_a.clone()),
            status: MeetingStatus::Completed,
            scheduled_at: now - Duration::days(3),
        }],
        activities: vec![],
        offers: 2,
    });
    crm.insert_deal_bundle(DealProbabilityInput {
        deal: DealRecord {
            id: DealId("deal-open-2".to_string()),
            tenant: tenant.clone(),
            lead: Some(LeadId("lead-warm".to_string())),
            stage: DealStage::Proposal,
            status: DealStatus::Open,
            value: 750_000.0,
            opened_at: now - Duration::days(12),
            closed_at: None,
        },
        contacts: vec![],
        meetings: vec![],
        activities: vec![ActivityEvent {
            lead: Some(LeadId("lead-warm".to_string())),
            event_type: "note".to_string(),
            tags: vec!["competitor_flag".to_string()],
            at: now - Duration::days(2),
        }],
        offers: 1,
    });

    let user_a = UserRecord {
        id: agent_a.clone(),
        name: "Amira Saleh".to_string(),
        active: true,
    };
    crm.insert_user(
        user_a.clone(),
        DisciplineInput {
            user: user_a,
            assigned_leads: vec![],
            calls: vec![CallLog {
                lead: LeadId("lead-hot".to_string()),
                user: Some(agent_a.clone()),
                at: now - Duration::days(1),
                objection: None,
            }],
            organized_meetings: vec![MeetingRecord {
                lead: Some(LeadId("lead-hot".to_string())),
                organizer: Some(agent_a.clone()),
                status: MeetingStatus::Completed,
                scheduled_at: now - Duration::days(2),
            }],
            tasks: vec![TaskRecord {
                id: TaskId("task-shortlist".to_string()),
                title: "send shortlist".to_string(),
                lead: Some(LeadId("lead-hot".to_string())),
                linked_deal: None,
                assignee: Some(agent_a.clone()),
                created_by: None,
                status: TaskStatus::Completed,
                due_at: Some(now - Duration::days(4)),
                completed_at: Some(now - Duration::days(4)),
                created_at: now - Duration::days(6),
            }],
            first_touch_hours: vec![6.0, 18.0],
        },
    );

    let user_b = UserRecord {
        id: agent_b.clone(),
        name: "Bassem Nour".to_string(),
        active: true,
    };
    crm.insert_user(
        user_b.clone(),
        DisciplineInput {
            user: user_b,
            assigned_leads: vec![],
            calls: vec![],
            organized_meetings: vec![],
            tasks: vec![TaskRecord {
                id: TaskId("task-brochure".to_string()),
                title: "share brochure".to_string(),
                lead: Some(LeadId("lead-warm".to_string())),
                linked_deal: None,
                assignee: Some(agent_b.clone()),
                created_by: None,
                status: TaskStatus::Open,
                due_at: Some(now + Duration::days(1)),
                completed_at: None,
                created_at: now - Duration::days(2),
            }],
            first_touch_hours: vec![50.0],
        },
    );

    crm.push_task(TaskRecord {
        id: TaskId("task-annex".to_string()),
        title: "confirm contract annex".to_string(),
        lead: None,
        linked_deal: Some(DealId("deal-open-1".to_string())),
        assignee: Some(agent_a.clone()),
        created_by: Some(agent_b.clone()),
        status: TaskStatus::Open,
        due_at: Some(now + Duration::hours(30)),
        completed_at: None,
        created_at: now - Duration::days(1),
    });
    crm.push_task(TaskRecord {
        id: TaskId("task-callback".to_string()),
        title: "call back Omar".to_string(),
        lead: Some(LeadId("lead-warm".to_string())),
        linked_deal: None,
        assignee: Some(agent_b.clone()),
        created_by: Some(agent_a),
        status: TaskStatus::Open,
        due_at: Some(now - Duration::hours(30)),
        completed_at: None,
        created_at: now - Duration::days(3),
    });

    crm.push_deadline(DeadlineRecord {
        title: "reservation expiry".to_string(),
        linked_deal: Some(DealId("deal-open-2".to_string())),
        assignee: Some(agent_b),
        due_at: now + Duration::days(2),
    });
}
