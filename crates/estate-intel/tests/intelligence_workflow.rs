//! End-to-end tests for the intelligence scoring workflow.
//!
//! Scenarios exercise the public service facade and the HTTP router end to
//! end: scoring, probability modeling, forecasting, and trigger dispatch,
//! all against in-memory collaborators.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Duration, Utc};
    use serde_json::Value;

    use estate_intel::intelligence::{
        ActivityEvent, AuditEntry, AuditError, AuditSink, CallLog, CrmRepository, DeadlineRecord,
        DealId, DealProbabilityInput, DealRecord, DisciplineIndexSnapshot, DisciplineInput,
        IntelligenceService, LeadId, LeadRecord, LeadScoreSnapshot, LeadScoringInput,
        MeetingRecord, MeetingStatus, ModuleConfigStore, RankingSnapshot, RepositoryError,
        RescheduleRequest, RiskScore, SnapshotRepository, TaskId, TaskRecord, TaskStatus, TenantId,
        UserId, UserRecord,
    };

    pub(super) const TENANT: &str = "acme-estates";

    pub(super) fn tenant() -> TenantId {
        TenantId(TENANT.to_string())
    }

    #[derive(Default)]
    pub(super) struct MemoryCrm {
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

    impl MemoryCrm {
        pub(super) fn insert_lead(&self, input: LeadScoringInput) {
            self.lead_index.lock().expect("lock").push(input.lead.clone());
            self.lead_inputs
                .lock()
                .expect("lock")
                .insert(input.lead.id.0.clone(), input);
        }
    }

    impl CrmRepository for MemoryCrm {
        fn lead_scoring_input(
            &self,
            _tenant: &TenantId,
            lead: &LeadId,
        ) -> Result<Option<LeadScoringInput>, RepositoryError> {
            Ok(self.lead_inputs.lock().expect("lock").get(&lead.0).cloned())
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
                .expect("lock")
                .iter()
                .filter(|lead| lead.source == source && lead.created_at >= since)
                .cloned()
                .collect())
        }

        fn leads(&self, _tenant: &TenantId) -> Result<Vec<LeadRecord>, RepositoryError> {
            Ok(self.lead_index.lock().expect("lock").clone())
        }

        fn deal_probability_input(
            &self,
            _tenant: &TenantId,
            deal: &DealId,
        ) -> Result<Option<DealProbabilityInput>, RepositoryError> {
            Ok(self.deal_inputs.lock().expect("lock").get(&deal.0).cloned())
        }

        fn deals(&self, _tenant: &TenantId) -> Result<Vec<DealRecord>, RepositoryError> {
            Ok(self.deal_index.lock().expect("lock").clone())
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
                .expect("lock")
                .get(&user.0)
                .cloned())
        }

        fn active_users(&self, _tenant: &TenantId) -> Result<Vec<UserRecord>, RepositoryError> {
            Ok(self
                .users
                .lock()
                .expect("lock")
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
                .expect("lock")
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
                .expect("lock")
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
                .expect("lock")
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
            self.engagements.lock().expect("lock").push(event);
            Ok(())
        }
    }

    #[derive(Default)]
    pub(super) struct MemorySnapshots {
        pub lead_scores: Mutex<Vec<LeadScoreSnapshot>>,
        pub discipline_indexes: Mutex<Vec<DisciplineIndexSnapshot>>,
        pub risk_scores: Mutex<Vec<RiskScore>>,
        pub rankings: Mutex<Vec<RankingSnapshot>>,
    }

    impl MemorySnapshots {
        pub(super) fn lead_scores(&self) -> Vec<LeadScoreSnapshot> {
            self.lead_scores.lock().expect("lock").clone()
        }

        pub(super) fn rankings(&self) -> Vec<RankingSnapshot> {
            self.rankings.lock().expect("lock").clone()
        }
    }

    impl SnapshotRepository for MemorySnapshots {
        fn append_lead_score(
            &self,
            snapshot: LeadScoreSnapshot,
        ) -> Result<LeadScoreSnapshot, RepositoryError> {
            self.lead_scores.lock().expect("lock").push(snapshot.clone());
            Ok(snapshot)
        }

        fn append_discipline_index(
            &self,
            snapshot: DisciplineIndexSnapshot,
        ) -> Result<DisciplineIndexSnapshot, RepositoryError> {
            self.discipline_indexes
                .lock()
                .expect("lock")
                .push(snapshot.clone());
            Ok(snapshot)
        }

        fn append_risk_score(&self, snapshot: RiskScore) -> Result<RiskScore, RepositoryError> {
            self.risk_scores.lock().expect("lock").push(snapshot.clone());
            Ok(snapshot)
        }

        fn append_ranking(
            &self,
            snapshot: RankingSnapshot,
        ) -> Result<RankingSnapshot, RepositoryError> {
            self.rankings.lock().expect("lock").push(snapshot.clone());
            Ok(snapshot)
        }
    }

    #[derive(Default)]
    pub(super) struct MemoryConfig {
        pub blobs: Mutex<HashMap<String, Value>>,
    }

    impl ModuleConfigStore for MemoryConfig {
        fn get_config(
            &self,
            tenant: &TenantId,
            _module_key: &str,
        ) -> Result<Option<Value>, RepositoryError> {
            Ok(self.blobs.lock().expect("lock").get(&tenant.0).cloned())
        }
    }

    #[derive(Default)]
    pub(super) struct MemoryAudit {
        pub entries: Mutex<Vec<AuditEntry>>,
    }

    impl MemoryAudit {
        pub(super) fn entries(&self) -> Vec<AuditEntry> {
            self.entries.lock().expect("lock").clone()
        }
    }

    impl AuditSink for MemoryAudit {
        fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
            self.entries.lock().expect("lock").push(entry);
            Ok(())
        }
    }

    pub(super) type Service =
        IntelligenceService<MemoryCrm, MemorySnapshots, MemoryConfig, MemoryAudit>;

    pub(super) struct Collaborators {
        pub crm: Arc<MemoryCrm>,
        pub snapshots: Arc<MemorySnapshots>,
        pub config: Arc<MemoryConfig>,
        pub audit: Arc<MemoryAudit>,
    }

    pub(super) fn build_service() -> (Arc<Service>, Collaborators) {
        let crm = Arc::new(MemoryCrm::default());
        let snapshots = Arc::new(MemorySnapshots::default());
        let config = Arc::new(MemoryConfig::default());
        let audit = Arc::new(MemoryAudit::default());
        let service = Arc::new(IntelligenceService::new(
            crm.clone(),
            snapshots.clone(),
            config.clone(),
            audit.clone(),
        ));

        (
            service,
            Collaborators {
                crm,
                snapshots,
                config,
                audit,
            },
        )
    }

    pub(super) fn scored_lead(id: &str) -> LeadScoringInput {
        let now = Utc::now();
        let lead = LeadRecord {
            id: LeadId(id.to_string()),
            tenant: tenant(),
            source: "facebook".to_string(),
            contact_name: "Nora Hassan".to_string(),
            budget: Some(1_200_000.0),
            property_type: Some("apartment".to_string()),
            location: Some("new_cairo".to_string()),
            tags: vec!["finance".to_string()],
            assigned_user: Some(UserId("agent-1".to_string())),
            next_follow_up_at: None,
            converted_at: None,
            created_at: now - Duration::days(14),
            updated_at: now - Duration::days(1),
        };

        LeadScoringInput {
            tasks: vec![TaskRecord {
                id: TaskId("task-viewing".to_string()),
                title: "arrange viewing".to_string(),
                lead: Some(lead.id.clone()),
                linked_deal: None,
                assignee: Some(UserId("agent-1".to_string())),
                created_by: None,
                status: TaskStatus::Completed,
                due_at: Some(now - Duration::days(2)),
                completed_at: Some(now - Duration::days(2)),
                created_at: now - Duration::days(4),
            }],
            call_logs: vec![CallLog {
                lead: lead.id.clone(),
                user: Some(UserId("agent-1".to_string())),
                at: now - Duration::days(1),
                objection: None,
            }],
            meetings: vec![MeetingRecord {
                lead: Some(lead.id.clone()),
                organizer: Some(UserId("agent-1".to_string())),
                status: MeetingStatus::Completed,
                scheduled_at: now - Duration::days(3),
            }],
            stage_history: vec![],
            activities: vec![ActivityEvent {
                lead: Some(lead.id.clone()),
                event_type: "property_view".to_string(),
                tags: vec![],
                at: now - Duration::days(2),
            }],
            extensions: vec![],
            lead,
        }
    }
}

mod scoring {
    use super::common::*;
    use estate_intel::intelligence::LeadId;
    use serde_json::json;

    #[test]
    fn facade_scores_and_persists_history() {
        let (service, collaborators) = build_service();
        collaborators.crm.insert_lead(scored_lead("lead-1"));

        let first = service
            .score_lead(&tenant(), &LeadId("lead-1".to_string()))
            .expect("first score");
        let second = service
            .score_lead(&tenant(), &LeadId("lead-1".to_string()))
            .expect("second score");

        assert!((first.score - second.score).abs() < 1e-6);
        assert_eq!(collaborators.snapshots.lead_scores().len(), 2);
        assert!(collaborators
            .audit
            .entries()
            .iter()
            .all(|entry| entry.tenant.0 == TENANT));
    }

    #[test]
    fn tenant_overrides_change_the_composite() {
        let (service, collaborators) = build_service();
        collaborators.crm.insert_lead(scored_lead("lead-1"));

        let baseline = service
            .score_lead(&tenant(), &LeadId("lead-1".to_string()))
            .expect("baseline score");

        // Shift all weight onto the historical factor, which is weak for a
        // lead with no conversions behind its source.
        collaborators.config.blobs.lock().expect("lock").insert(
            TENANT.to_string(),
            json!({
                "leadScoreWeights": {
                    "demographic": 0.0,
                    "engagement": 0.0,
                    "behavioral": 0.0,
                    "historical": 1.0
                }
            }),
        );

        let reweighted = service
            .score_lead(&tenant(), &LeadId("lead-1".to_string()))
            .expect("reweighted score");

        assert_ne!(baseline.score, reweighted.score);
        assert_eq!(reweighted.score, reweighted.reasons.factors.historical);
    }
}

mod routing {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use estate_intel::intelligence::{
        intelligence_router, IntelligenceState, TriggerDispatcher,
    };

    use super::common::*;

    fn build_router() -> (axum::Router, Arc<MemorySnapshots>, Arc<MemoryCrm>) {
        let (service, collaborators) = build_service();
        let dispatcher = TriggerDispatcher::spawn(service.clone());
        let router = intelligence_router(IntelligenceState {
            service,
            dispatcher,
        });
        (router, collaborators.snapshots, collaborators.crm)
    }

    #[tokio::test]
    async fn post_score_returns_the_snapshot() {
        let (router, snapshots, crm) = build_router();
        crm.insert_lead(scored_lead("lead-1"));

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/tenants/{TENANT}/leads/lead-1/score"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::CREATED);

        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("lead"), Some(&json!("lead-1")));
        assert!(payload.get("score").and_then(Value::as_f64).is_some());
        assert!(payload.pointer("/reasons/factors/demographic").is_some());
        assert_eq!(snapshots.lead_scores().len(), 1);
    }

    #[tokio::test]
    async fn unknown_lead_maps_to_not_found() {
        let (router, snapshots, _crm) = build_router();

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/tenants/{TENANT}/leads/ghost/score"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(snapshots.lead_scores().is_empty());
    }

    #[tokio::test]
    async fn engagement_post_records_and_queues_a_rescore() {
        let (router, snapshots, crm) = build_router();
        crm.insert_lead(scored_lead("lead-1"));

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/tenants/{TENANT}/leads/lead-1/engagement"))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&json!({ "event_type": "site_visit" }))
                            .expect("serialize"),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(crm.engagements.lock().expect("lock").len(), 1);

        // The queued trigger rescores the lead off the write path.
        let mut rescored = false;
        for _ in 0..100 {
            if !snapshots.lead_scores().is_empty() {
                rescored = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(rescored);
    }

    #[tokio::test]
    async fn trigger_post_is_accepted_and_processed() {
        let (router, snapshots, crm) = build_router();
        crm.insert_lead(scored_lead("lead-1"));

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/tenants/{TENANT}/triggers"))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&json!({
                            "kind": "lead_changed",
                            "lead": "lead-1"
                        }))
                        .expect("serialize"),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = to_bytes(response.into_body(), 1024).await.expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("queued"), Some(&json!("lead_changed")));

        let mut scored = false;
        for _ in 0..100 {
            if !snapshots.lead_scores().is_empty() {
                scored = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(scored);
    }

    #[tokio::test]
    async fn forecast_post_persists_a_ranking_snapshot() {
        let (router, snapshots, _crm) = build_router();

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/tenants/{TENANT}/forecast/revenue"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("kind"), Some(&json!("revenue_forecast")));
        assert_eq!(snapshots.rankings().len(), 1);
    }
}
